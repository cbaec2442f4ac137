//! End-to-end behavior of schema-gated rules on a user-registration contract.

use covenant_contract::{Contract, ContractBuilder, ContractError, KeySpec};
use covenant_kernel::{ErrorHash, ErrorKey, KeyPath, Message};
use covenant_schema::{KeyDecl, Schema, ValueType};
use serde_json::json;

fn user_schema() -> Schema {
    let address = Schema::new(vec![KeyDecl::required("street", ValueType::String)])
        .expect("address schema");
    let details = Schema::new(vec![KeyDecl::optional("address", ValueType::Hash(address))])
        .expect("details schema");
    Schema::new(vec![
        KeyDecl::required("email", ValueType::String).filled(),
        KeyDecl::optional("login", ValueType::String).filled(),
        KeyDecl::optional("details", ValueType::Hash(details)),
    ])
    .expect("user schema")
}

fn contract_class() -> ContractBuilder {
    Contract::builder("TestContract", user_schema())
}

#[test]
fn rule_on_a_flat_key_reports_at_that_key() {
    let contract = contract_class()
        .rule(["login"], |ctx, failures| {
            if ctx.str_value().is_some_and(|login| login.len() < 3) {
                failures.key().failure("is too short");
            }
            Ok(())
        })
        .expect("login is declared")
        .build();

    let result = contract
        .call(&json!({"email": "jane@doe.org", "login": "ab"}))
        .expect("call");

    assert!(result.is_failure());
    assert_eq!(
        result.errors().to_h(),
        ErrorHash::from([(ErrorKey::from("login"), json!(["is too short"]))])
    );

    let ok = contract
        .call(&json!({"email": "jane@doe.org", "login": "jane"}))
        .expect("call");
    assert!(ok.is_success());
}

#[test]
fn unconditional_rule_can_target_an_undeclared_key() {
    let contract = contract_class()
        .base_rule(|_, failures| {
            failures.key_at("custom").failure("this works");
            Ok(())
        })
        .build();

    let result = contract
        .call(&json!({"email": "jane@doe.org", "login": "jane"}))
        .expect("call");

    assert_eq!(
        result.errors().to_h(),
        ErrorHash::from([(ErrorKey::from("custom"), json!(["this works"]))])
    );
}

#[test]
fn rule_on_deep_key_does_not_run_when_an_ancestor_failed() {
    let contract = contract_class()
        .rule([KeySpec::dotted("details.address.street")], |_, failures| {
            failures.key().failure("should never be reported");
            Ok(())
        })
        .expect("street is declared")
        .build();

    let result = contract
        .call(&json!({"email": "jane@doe.org", "login": "jane", "details": null}))
        .expect("call");

    assert_eq!(
        result.errors().to_h(),
        ErrorHash::from([(ErrorKey::from("details"), json!(["must be a hash"]))])
    );
    assert!(result.schema_error_at("details"));
    assert!(!result.rule_error_at("details"));
}

#[test]
fn rules_on_parent_and_child_paths_accumulate_into_a_mixed_node() {
    let contract = contract_class()
        .rule([KeySpec::nested("details", "address")], |_, failures| {
            failures.key().failure("invalid no matter what");
            Ok(())
        })
        .expect("address is declared")
        .rule([KeySpec::nested("details", "address")], |_, failures| {
            failures.key().failure("seriously invalid");
            Ok(())
        })
        .expect("address is declared")
        .rule([KeySpec::dotted("details.address.street")], |ctx, failures| {
            if ctx.str_value().is_some_and(|street| street.trim().is_empty()) {
                failures.key().failure("cannot be empty");
            }
            Ok(())
        })
        .expect("street is declared")
        .rule([KeySpec::dotted("details.address.street")], |ctx, failures| {
            if !ctx
                .str_value()
                .is_some_and(|street| street.chars().any(|c| c.is_ascii_digit()))
            {
                failures.key().failure("must include a number");
            }
            Ok(())
        })
        .expect("street is declared")
        .build();

    let result = contract
        .call(&json!({
            "email": "jane@doe.org",
            "login": "jane",
            "details": {"address": {"street": " "}},
        }))
        .expect("call");

    assert_eq!(
        result.errors().to_h(),
        ErrorHash::from([(
            ErrorKey::from("details"),
            json!({
                "address": [
                    ["invalid no matter what", "seriously invalid"],
                    {"street": ["cannot be empty", "must include a number"]}
                ]
            })
        )])
    );
}

#[test]
fn base_failures_coexist_with_keyed_schema_failures() {
    let contract = contract_class()
        .base_rule(|_, failures| {
            failures.key().failure("this whole thing is invalid");
            Ok(())
        })
        .build();

    let result = contract
        .call(&json!({"email": "jane@doe.org", "login": ""}))
        .expect("call");

    assert_eq!(
        result.errors().to_h(),
        ErrorHash::from([
            (ErrorKey::from("login"), json!(["must be filled"])),
            (ErrorKey::Base, json!(["this whole thing is invalid"])),
        ])
    );
    let base: Vec<&str> = result
        .errors()
        .filter(Message::is_base)
        .map(|message| message.text.as_str())
        .collect();
    assert_eq!(base, vec!["this whole thing is invalid"]);
}

#[test]
fn declaring_unknown_keys_fails_immediately() {
    let err = contract_class()
        .rule(["invalid", "wrong"], |_, _| Ok(()))
        .expect_err("keys are not in the schema");

    assert!(matches!(err, ContractError::InvalidKeys { .. }));
    assert_eq!(
        err.to_string(),
        "TestContract.rule specifies keys that are not defined by the schema: [:invalid, :wrong]"
    );
}

#[test]
fn declaring_unknown_nested_keys_echoes_each_shape() {
    let cases = [
        (KeySpec::nested("details", "foo"), "[{:details=>:foo}]"),
        (
            KeySpec::nested("details", KeySpec::nested("address", "foo")),
            "[{:details=>{:address=>:foo}}]",
        ),
        (
            KeySpec::nested_list("details", ["address", "foo"]),
            "[{:details=>[:address, :foo]}]",
        ),
        (KeySpec::dotted("details.foo"), "[\"details.foo\"]"),
    ];
    for (spec, shape) in cases {
        let err = contract_class()
            .rule([spec], |_, _| Ok(()))
            .expect_err("key is not in the schema");
        assert_eq!(
            err.to_string(),
            format!("TestContract.rule specifies keys that are not defined by the schema: {shape}")
        );
    }
}

#[test]
fn list_valued_hash_triggers_on_every_listed_key() {
    let schema = Schema::new(vec![KeyDecl::optional(
        "details",
        ValueType::Hash(
            Schema::new(vec![
                KeyDecl::optional("city", ValueType::String),
                KeyDecl::optional("zip", ValueType::String),
            ])
            .expect("details schema"),
        ),
    )])
    .expect("schema");
    let contract = Contract::builder("AddressContract", schema)
        .rule([KeySpec::nested_list("details", ["city", "zip"])], |ctx, failures| {
            let city = ctx.value_at("details.city").and_then(|v| v.as_str());
            let zip = ctx.value_at("details.zip").and_then(|v| v.as_str());
            if city == Some("Springfield") && zip.is_some_and(|zip| !zip.starts_with('6')) {
                failures.key_at("details.zip").failure("does not match city");
            }
            Ok(())
        })
        .expect("keys are declared")
        .build();

    let mismatch = contract
        .call(&json!({"details": {"city": "Springfield", "zip": "12345"}}))
        .expect("call");
    assert_eq!(
        mismatch.errors().messages_at(&KeyPath::parse("details.zip")),
        vec!["does not match city"]
    );

    let zip_failed = contract
        .call(&json!({"details": {"city": "Springfield", "zip": 12345}}))
        .expect("call");
    assert_eq!(
        zip_failed.errors().messages_at(&KeyPath::parse("details.zip")),
        vec!["must be a string"]
    );
}

#[test]
fn unconditional_rules_run_even_when_everything_else_failed() {
    let contract = contract_class()
        .rule(["email"], |_, failures| {
            failures.failure("never");
            Ok(())
        })
        .expect("email is declared")
        .base_rule(|_, failures| {
            failures.base().failure("checked anyway");
            Ok(())
        })
        .build();

    let result = contract.call(&json!("not a hash")).expect("call");
    assert_eq!(
        result.errors().base_messages(),
        vec!["must be a hash", "checked anyway"]
    );
    assert!(!result.errors().error_at(&KeyPath::parse("email")));
}

#[test]
fn each_rule_reports_by_element_index() {
    let schema = Schema::new(vec![KeyDecl::required(
        "nums",
        ValueType::array_of(ValueType::Integer),
    )])
    .expect("schema");
    let contract = Contract::builder("NumbersContract", schema)
        .rule_each(["nums"], |ctx, failures| {
            if ctx.value().and_then(|v| v.as_i64()).is_some_and(|n| n <= 0) {
                failures.failure("must be positive");
            }
            Ok(())
        })
        .expect("nums is declared")
        .build();

    let result = contract.call(&json!({"nums": [3, -1, "x", 0]})).expect("call");
    assert!(result.rule_error_at("nums.1"));
    assert!(result.schema_error_at("nums.2"));
    assert!(!result.rule_error_at("nums.2"));
    insta::assert_json_snapshot!(result.errors().to_json(), @r###"
    {
      "base": [],
      "errors": {
        "nums": {
          "1": [
            "must be positive"
          ],
          "2": [
            "must be an integer"
          ],
          "3": [
            "must be positive"
          ]
        }
      }
    }
    "###);
}

#[test]
fn macros_are_reusable_rule_bodies() {
    let contract = contract_class()
        .register_macro("no_spaces", |ctx, failures| {
            if ctx.str_value().is_some_and(|s| s.contains(' ')) {
                failures.failure("must not contain spaces");
            }
            Ok(())
        })
        .rule_macro(["login"], "no_spaces")
        .expect("macro is registered")
        .rule_macro(["email"], "no_spaces")
        .expect("macro is registered")
        .build();

    let result = contract
        .call(&json!({"email": "jane @doe.org", "login": "ja ne"}))
        .expect("call");
    assert_eq!(
        result.errors().to_h(),
        ErrorHash::from([
            (ErrorKey::from("email"), json!(["must not contain spaces"])),
            (ErrorKey::from("login"), json!(["must not contain spaces"])),
        ])
    );

    let err = contract_class()
        .rule_macro(["login"], "missing")
        .expect_err("macro is not registered");
    assert!(matches!(err, ContractError::UnknownMacro { name, .. } if name == "missing"));
}

#[test]
fn failing_rule_body_propagates_to_the_caller() {
    let contract = contract_class()
        .rule(["email"], |ctx, _| {
            let email = ctx.str_value().ok_or("email should be a string here")?;
            if email.ends_with(".invalid") {
                return Err(format!("cannot resolve domain of {email}").into());
            }
            Ok(())
        })
        .expect("email is declared")
        .build();

    let err = contract
        .call(&json!({"email": "jane@doe.invalid"}))
        .expect_err("rule body errors abort the call");
    assert_eq!(
        err.to_string(),
        "rule #0 of TestContract failed: cannot resolve domain of jane@doe.invalid"
    );
}

#[test]
fn values_only_carry_declared_keys() {
    let contract = contract_class().build();
    let result = contract
        .call(&json!({"email": "jane@doe.org", "admin": true}))
        .expect("call");
    assert!(result.is_success());
    assert_eq!(result.values(), &json!({"email": "jane@doe.org"}));
    assert_eq!(result.value_at("email"), Some(&json!("jane@doe.org")));
}
