use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about = "Create, inspect and edit OFS disk images")]
pub struct Cli {
    /// Disk image file
    pub image: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a zero-filled image
    Create {
        /// Number of blocks
        blocks: usize,
    },

    /// Lay out an empty file system on the image
    Format {
        #[arg(default_value = "")]
        label: String,
    },

    /// List files
    Ls,

    /// Print a file's content
    Cat {
        name: String,

        #[arg(long, short, default_value_t = 0)]
        offset: usize,

        /// Bytes to read, defaults to the rest of the file
        #[arg(long, short)]
        length: Option<usize>,
    },

    /// Write text into a file
    Write {
        name: String,

        text: String,

        #[arg(long, short, default_value_t = 0)]
        offset: usize,
    },

    /// Copy a host file into the image
    Put {
        name: String,

        source: PathBuf,

        #[arg(long, short, default_value_t = 0)]
        offset: usize,
    },

    /// Delete a file
    Rm { name: String },

    /// Dump the superblock, used blocks and files
    Debug,
}
