use crate::support::{EXIT_CONFIG, load_contract_or_exit, print_json_or_exit, read_input_or_exit};
use covenant_kernel::Message;
use serde_json::json;

pub fn run(contract_path: String, input: String, json_output: bool) {
    let contract = load_contract_or_exit(&contract_path);
    let value = read_input_or_exit(&input);

    let result = contract.call(&value).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(EXIT_CONFIG);
    });

    if json_output {
        let mut payload = result.to_json();
        payload["contract"] = json!(contract.name());
        payload["input"] = json!(input);
        print_json_or_exit(&payload);
    } else {
        println!("covenant check {} --input {input}", contract.name());
        println!("  Contract: {contract_path}");
        println!("  Rules: {}", contract.rules().len());
        if result.is_success() {
            println!("  Result: valid");
        } else {
            println!("  Result: invalid ({} failures)", result.errors().len());
            for message in result.errors() {
                println!("    - {}", describe(message));
            }
        }
    }

    if result.is_failure() {
        std::process::exit(1);
    }
}

fn describe(message: &Message) -> String {
    let location = match &message.path {
        Some(path) => path.to_string(),
        None => "(base)".to_string(),
    };
    let phase = if message.is_schema() { "schema" } else { "rule" };
    format!("{location}: {} [{phase}]", message.text)
}
