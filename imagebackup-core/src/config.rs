//! Compile-time defaults for a backup run.
//!
//! `imagebackup` takes no configuration file and reads no environment
//! variables, so everything tunable lives here and is passed down explicitly.
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Transfer block size used by the clone executor (1 MiB).
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Settings {
    /// Bytes moved per read/write. Also the unit that gets zero-filled on a read error.
    pub block_size: usize,
    /// Live mount table to consult before touching a block device.
    pub mounts_path: PathBuf,
    /// Output image name is `<prefix><date><.extension>`.
    pub image_prefix: String,
    pub image_date_format: String,
    pub image_extension: String,
    /// Answers accepted as "yes" by confirmation prompts, compared case-insensitively.
    pub affirmative: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            mounts_path: PathBuf::from("/proc/self/mounts"),
            image_prefix: "image-".to_string(),
            image_date_format: "%d%m%y".to_string(),
            image_extension: "img".to_string(),
            affirmative: vec!["y".to_string(), "yes".to_string()],
        }
    }
}

impl Settings {
    /// File name of the image captured on `date`, e.g. `image-190826.img`.
    pub fn image_file_name(&self, date: NaiveDate) -> String {
        format!(
            "{}{}.{}",
            self.image_prefix,
            date.format(&self.image_date_format),
            self.image_extension
        )
    }

    /// Full path of the image written into `folder` on `date`.
    pub fn image_path(&self, folder: &Path, date: NaiveDate) -> PathBuf {
        folder.join(self.image_file_name(date))
    }

    /// Returns `true` only for one of the affirmative tokens. Anything else,
    /// including an empty answer, counts as a refusal.
    pub fn is_affirmative(&self, answer: &str) -> bool {
        let answer = answer.trim();
        self.affirmative
            .iter()
            .any(|token| token.eq_ignore_ascii_case(answer))
    }
}
