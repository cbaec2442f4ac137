use crate::support::{load_contract_or_exit, print_json_or_exit};
use serde_json::json;

pub fn run(contract_path: String, json_output: bool) {
    let contract = load_contract_or_exit(&contract_path);
    let keys: Vec<String> = contract
        .validator()
        .key_map()
        .iter()
        .map(ToString::to_string)
        .collect();

    if json_output {
        let rules: Vec<_> = contract
            .rules()
            .into_iter()
            .map(|rule| {
                json!({
                    "contract": rule.owner(),
                    "order": rule.order(),
                    "keys": rule.paths().iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "each": rule.mode() == covenant_contract::RuleMode::Each,
                })
            })
            .collect();
        print_json_or_exit(&json!({
            "contract": contract.name(),
            "keys": keys,
            "rules": rules,
        }));
    } else {
        println!("covenant keys {}", contract.name());
        println!("  Contract: {contract_path}");
        for key in &keys {
            println!("    {key}");
        }
        println!("  Rules: {}", contract.rules().len());
    }
}
