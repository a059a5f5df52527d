mod cli;

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Command};
use ofs::{FileSystem, ImageFile};

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ofs: {e} (code {})", e.code());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> ofs::Result<()> {
    let device = match &cli.command {
        Command::Create { blocks } => {
            ImageFile::create(&cli.image, *blocks)?;
            println!("created {:?} with {blocks} blocks", cli.image);
            return Ok(());
        }
        _ => Arc::new(ImageFile::open(&cli.image)?),
    };
    let mut fs = FileSystem::new(device);

    match cli.command {
        Command::Format { label } => {
            fs.format(&label)?;
            print!("{}", fs.dump()?);
            return Ok(());
        }
        Command::Debug => {
            if let Err(e) = fs.mount() {
                log::warn!("not mounted: {e}");
            }
            print!("{}", fs.dump()?);
            return Ok(());
        }
        command => {
            fs.mount()?;
            execute(&mut fs, command)?;
        }
    }

    fs.unmount()
}

fn execute(fs: &mut FileSystem<ImageFile>, command: Command) -> ofs::Result<()> {
    match command {
        Command::Ls => {
            for (i, file) in fs.list()?.iter().enumerate() {
                println!("{i}: {}, size: {} bytes", file.name, file.size);
            }
        }
        Command::Cat { name, offset, length } => {
            let length = match length {
                Some(length) => length,
                None => fs.stat(&name)?.size.saturating_sub(offset),
            };
            let data = fs.read_vec(&name, offset, length)?;
            io::stdout().write_all(&data)?;
        }
        Command::Write { name, text, offset } => {
            let written = fs.write(&name, offset, text.as_bytes())?;
            println!("{written} bytes written");
        }
        Command::Put { name, source, offset } => {
            let data = std::fs::read(&source)?;
            let written = fs.write(&name, offset, &data)?;
            println!("{written} bytes written");
        }
        Command::Rm { name } => {
            fs.delete(&name)?;
            println!("{name} deleted");
        }
        Command::Create { .. } | Command::Format { .. } | Command::Debug => {}
    }
    Ok(())
}
