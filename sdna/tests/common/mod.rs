//! Shared builders for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use sdna::{ariadne, inject_literal, sdnac, HermesConfig, MockModel, MockReply, Runtime, Sdnac};

/// Unit with an empty thread whose goal is `goal`.
pub fn unit(name: &str, goal: &str) -> Sdnac {
    sdnac(name, ariadne(name, vec![]), HermesConfig::new(name, goal))
}

/// Unit that records `<name>_ran = true` before generating, and extracts `tags`.
pub fn tagged_unit(name: &str, goal: &str, tags: &[&str]) -> Sdnac {
    sdnac(
        name,
        ariadne(name, vec![inject_literal(format!("{}_ran", name), true)]),
        HermesConfig::new(name, goal).with_output_tags(tags.iter().copied()),
    )
}

/// Runtime over a mock that answers prompts containing each marker from its script.
pub fn scripted(rules: Vec<(&str, Vec<MockReply>)>) -> (Runtime, Arc<MockModel>) {
    let mock = rules
        .into_iter()
        .fold(MockModel::new("default reply"), |m, (needle, replies)| m.on_prompt(needle, replies));
    let mock = Arc::new(mock);
    (Runtime::new().with_model(mock.clone()), mock)
}

pub fn texts(items: &[&str]) -> Vec<MockReply> {
    items.iter().map(|t| MockReply::text(*t)).collect()
}
