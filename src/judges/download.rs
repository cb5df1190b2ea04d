// Embedding model download helper.
//
// Fetches the ONNX export of paraphrase-multilingual-MiniLM-L12-v2 (~470 MB)
// and its tokenizer from HuggingFace. Files are stored in a platform-appropriate
// directory (~/.local/share/tonecheck/models/ on Linux) so they persist across
// runs.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use super::onnx::{MODEL_FILE, TOKENIZER_FILE};

const EMBEDDING_MODEL_NAME: &str = "paraphrase-multilingual-MiniLM-L12-v2";

const EMBEDDING_HF_URL: &str =
    "https://huggingface.co/sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2/resolve/main";

/// Remote path of the ONNX export inside the HuggingFace repo.
const REMOTE_MODEL_PATH: &str = "onnx/model.onnx";

/// Returns the default directory for storing model files.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tonecheck")
        .join("models")
}

/// Subdirectory within the model dir holding the sentence encoder.
pub fn embedding_model_dir(base: &Path) -> PathBuf {
    base.join(EMBEDDING_MODEL_NAME)
}

/// Check whether both embedding model files exist.
pub fn embedding_files_present(base: &Path) -> bool {
    let dir = embedding_model_dir(base);
    dir.join(MODEL_FILE).exists() && dir.join(TOKENIZER_FILE).exists()
}

/// Download the embedding model and tokenizer. Skips files that already exist.
pub async fn download_model(base: &Path) -> Result<()> {
    let dir = embedding_model_dir(base);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create model directory: {}", dir.display()))?;

    println!("\nSentence embedding model ({EMBEDDING_MODEL_NAME}):");

    let files = [
        (TOKENIZER_FILE, TOKENIZER_FILE, false),
        (REMOTE_MODEL_PATH, MODEL_FILE, true),
    ];

    for (remote, local, show_progress) in files {
        let dest = dir.join(local);
        if dest.exists() {
            info!(file = local, "Model file already exists, skipping");
            println!("  {local} (already exists)");
            continue;
        }
        println!("  Downloading {local}...");
        download_file(&format!("{EMBEDDING_HF_URL}/{remote}"), &dest, show_progress).await?;
    }

    Ok(())
}

/// Stream a single file from a URL to a local path.
///
/// Writes to a `.part` file first so an interrupted download never leaves a
/// truncated model that looks complete.
async fn download_file(url: &str, dest: &Path, show_progress: bool) -> Result<()> {
    let client = reqwest::Client::new();
    let mut response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download {}", url))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {}", response.status(), url);
    }

    let pb = if show_progress {
        Some(progress_bar(response.content_length())?)
    } else {
        None
    };

    let partial = dest.with_extension("part");
    let mut file = std::fs::File::create(&partial)
        .with_context(|| format!("Failed to create {}", partial.display()))?;

    while let Some(chunk) = response
        .chunk()
        .await
        .context("Failed to read response body")?
    {
        file.write_all(&chunk)
            .with_context(|| format!("Failed to write {}", partial.display()))?;
        if let Some(ref pb) = pb {
            pb.inc(chunk.len() as u64);
        }
    }
    file.flush()?;
    drop(file);

    std::fs::rename(&partial, dest)
        .with_context(|| format!("Failed to move download into {}", dest.display()))?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    info!("Downloaded {} to {}", url, dest.display());
    Ok(())
}

fn progress_bar(total_size: Option<u64>) -> Result<ProgressBar> {
    Ok(match total_size {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("    [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
                    .progress_chars("=> "),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(ProgressStyle::default_spinner().template("    {spinner} {bytes}")?);
            pb
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_dir_is_under_tonecheck() {
        let dir = default_model_dir();
        let path_str = dir.to_string_lossy();
        assert!(
            path_str.contains("tonecheck") && path_str.contains("models"),
            "Expected path containing tonecheck/models, got: {path_str}"
        );
    }

    #[test]
    fn test_embedding_model_dir_is_subdirectory() {
        let base = PathBuf::from("/tmp/test-models");
        assert_eq!(embedding_model_dir(&base), base.join(EMBEDDING_MODEL_NAME));
    }

    #[test]
    fn test_embedding_files_present_false_when_empty() {
        let dir = std::env::temp_dir().join("tonecheck-test-nonexistent");
        assert!(!embedding_files_present(&dir));
    }

    #[test]
    fn test_embedding_files_present_true_when_files_exist() {
        let dir = std::env::temp_dir().join("tonecheck-embed-test");
        let embed_dir = embedding_model_dir(&dir);
        std::fs::create_dir_all(&embed_dir).unwrap();
        std::fs::write(embed_dir.join(MODEL_FILE), b"fake").unwrap();
        std::fs::write(embed_dir.join(TOKENIZER_FILE), b"fake").unwrap();

        assert!(embedding_files_present(&dir));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
