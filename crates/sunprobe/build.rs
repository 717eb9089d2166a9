use std::fs;
use std::path::PathBuf;

use clap::CommandFactory;

#[path = "src/cli.rs"]
mod cli;

fn main() {
    println!("cargo::rerun-if-changed=src/cli.rs");

    let out_dir = PathBuf::from(std::env::var_os("OUT_DIR").expect("OUT_DIR"));
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("create man directory");

    // Pages are named `sunprobe-history.1` etc., so subcommands get their
    // parent's name as a prefix before rendering.
    let mut pending = vec![cli::Cli::command()];
    while let Some(cmd) = pending.pop() {
        let page = man_dir.join(format!("{}.1", cmd.get_name()));
        let mut roff = Vec::new();
        clap_mangen::Man::new(cmd.clone())
            .render(&mut roff)
            .expect("render man page");
        fs::write(&page, roff).expect("write man page");

        pending.extend(
            cmd.get_subcommands()
                .filter(|sub| !sub.is_hide_set())
                .map(|sub| sub.clone().name(format!("{}-{}", cmd.get_name(), sub.get_name()))),
        );
    }
}
