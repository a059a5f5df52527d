use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("block {0} is outside the device")]
    InvalidBlockId(u32),

    #[error("device geometry not supported: {0} blocks")]
    InvalidGeometry(usize),

    #[error("no volume is mounted")]
    NotMounted,

    #[error("a volume is already mounted")]
    AlreadyMounted,

    #[error("device is not formatted (magic {0:#06x})")]
    Unformatted(u16),

    #[error("file system size ({stored} blocks) and disk size ({actual} blocks) differ")]
    SizeMismatch { stored: usize, actual: usize },

    #[error("no free block left on the volume")]
    Exhausted,

    #[error("directory is full")]
    DirectoryFull,

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("range {offset}+{length} is beyond the maximum file size")]
    InvalidOffset { offset: usize, length: usize },

    #[error("directory entry {0} does not exist")]
    InvalidEntryIndex(usize),

    /// On-disk metadata that cannot be trusted, found at a known block.
    #[error("corrupt metadata at block {block}: {detail}")]
    Corruption { block: u32, detail: String },
}

impl FsError {
    /// Negative status code for front-ends that report failures as integers.
    pub fn code(&self) -> i32 {
        match self {
            FsError::Io(_) => -1,
            FsError::InvalidBlockId(_) => -2,
            FsError::InvalidGeometry(_) => -3,
            FsError::NotMounted => -4,
            FsError::AlreadyMounted => -5,
            FsError::Unformatted(_) => -6,
            FsError::SizeMismatch { .. } => -7,
            FsError::Exhausted => -8,
            FsError::DirectoryFull => -9,
            FsError::FileNotFound(_) => -10,
            FsError::InvalidOffset { .. } => -11,
            FsError::InvalidEntryIndex(_) => -12,
            FsError::Corruption { .. } => -13,
        }
    }
}

pub type Result<T> = core::result::Result<T, FsError>;
