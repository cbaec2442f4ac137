use crate::contract_file;
use covenant_contract::Contract;
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::path::Path;

/// Exit code for configuration and IO problems. Validation failures use 1.
pub const EXIT_CONFIG: i32 = 2;

pub fn load_contract_or_exit(path: &str) -> Contract {
    contract_file::load(Path::new(path)).unwrap_or_else(|e| {
        eprintln!("error: failed to load contract {path}: {e}");
        std::process::exit(EXIT_CONFIG);
    })
}

pub fn read_input_or_exit(path: &str) -> Value {
    let text = if path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).map(|_| buf)
    } else {
        std::fs::read_to_string(path)
    }
    .unwrap_or_else(|e| {
        eprintln!("error: failed to read input {path}: {e}");
        std::process::exit(EXIT_CONFIG);
    });

    serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("error: input {path} is not valid JSON: {e}");
        std::process::exit(EXIT_CONFIG);
    })
}

pub fn print_json_or_exit<T: Serialize>(payload: &T) {
    match serde_json::to_string_pretty(payload) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("error: failed to render JSON: {e}");
            std::process::exit(EXIT_CONFIG);
        }
    }
}
