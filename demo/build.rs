use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

fn main() {
    let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());

    let mut linkscr = File::create(out.join("memory.x")).unwrap();
    writeln!(
        linkscr,
        "MEMORY {{\n\
            FLASH (rx) : ORIGIN = 0x08000000, LENGTH = 1024K\n\
            RAM (rwx) : ORIGIN = 0x20000000, LENGTH = 128K\n\
        }}"
    )
    .unwrap();
    drop(linkscr);

    println!("cargo:rustc-link-search={}", out.display());
}
