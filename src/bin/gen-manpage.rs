//! Man page generator for spilink
//!
//! Writes `spilink.1` plus one `spilink-<command>.1` page per subcommand
//! into the given directory (default `man/`).

use clap::CommandFactory;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[path = "../cli.rs"]
mod cli;

fn render(cmd: clap::Command, dir: &Path, name: &str) -> io::Result<PathBuf> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd).render(&mut buffer)?;

    let path = dir.join(format!("{}.1", name));
    fs::write(&path, buffer)?;
    Ok(path)
}

fn main() -> io::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));
    fs::create_dir_all(&output_dir)?;

    let cmd = cli::Cli::command();
    for sub in cmd.get_subcommands() {
        let name = format!("spilink-{}", sub.get_name());
        let page = sub.clone().display_name(name.clone());
        println!("{}", render(page, &output_dir, &name)?.display());
    }
    println!("{}", render(cmd, &output_dir, "spilink")?.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_pages() {
        let dir = std::env::temp_dir().join(format!("spilink-man-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let path = render(cli::Cli::command(), &dir, "spilink").unwrap();
        assert_eq!(path, dir.join("spilink.1"));
        let page = fs::read_to_string(&path).unwrap();
        assert!(page.contains("spilink"));
        assert!(page.contains("transfer"));

        fs::remove_dir_all(&dir).unwrap();
    }
}
