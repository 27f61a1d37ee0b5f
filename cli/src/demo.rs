//! Offline demo mission.
//!
//! A scripted brain drives three mock wallet tools through one mission:
//! read the balance, read a price, make a small transfer, attempt a transfer
//! the wallet cannot cover, then finish.  The failing transfer shows up in
//! the trail as an `ERROR` event and the mission carries on.  The session is
//! exported, verified, and handed to a local attestor.

use std::{
    collections::VecDeque,
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::{json, Value};

use veritrail_audit::{JsonlCheckpoint, Recorder};
use veritrail_contracts::{
    config::RuntimeConfig,
    error::{BrainError, ToolError, VeritrailResult},
    event::EventKind,
};
use veritrail_core::{Attestor, Brain, Receipt, Tool, ToolRegistry};
use veritrail_mission::MissionLoop;
use veritrail_verify::SessionVerifier;

const DEMO_ADDRESS: &str = "0x4b1d6e02c0ffee00000000000000000000a11ce0";
const BURN_ADDRESS: &str = "0x000000000000000000000000000000000000dEaD";
const OPENING_BALANCE_ETH: f64 = 1.5;

const OBJECTIVE: &str = "Pay 0.25 ETH to the burn address if the wallet can afford it, then try to pay 50 ETH.";

const SCRIPT: &[&str] = &[
    "<think>I should know what I hold before spending.</think>\n\
     {\"thought\": \"check the balance first\", \"tool\": \"get_balance\", \"params\": {}}",
    "```json\n{\"thought\": \"price the payment\", \"tool\": \"get_price\", \"params\": {\"pair\": \"ETH/USD\"}}\n```",
    "Sending the small payment now: \
     {\"thought\": \"1.5 ETH covers 0.25 ETH\", \"tool\": \"transfer\", \
     \"params\": {\"to\": \"0x000000000000000000000000000000000000dEaD\", \"amount\": 0.25}}",
    "{\"thought\": \"attempt the large payment\", \"tool\": \"transfer\", \
     \"params\": {\"to\": \"0x000000000000000000000000000000000000dEaD\", \"amount\": 50}}",
    "{\"thought\": \"the large payment failed as expected; done\", \"complete\": true}",
];

// ── Collaborators ─────────────────────────────────────────────────────────────

/// Replays [`SCRIPT`] one answer per step.
struct ScriptedBrain {
    answers: Mutex<VecDeque<&'static str>>,
}

impl ScriptedBrain {
    fn new() -> Self {
        Self {
            answers: Mutex::new(SCRIPT.iter().copied().collect()),
        }
    }
}

#[async_trait]
impl Brain for ScriptedBrain {
    async fn think(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String, BrainError> {
        let mut answers = self
            .answers
            .lock()
            .map_err(|_| BrainError::Transport("script lock poisoned".to_string()))?;
        Ok(answers
            .pop_front()
            .unwrap_or(r#"{"thought": "script exhausted", "complete": true}"#)
            .to_string())
    }
}

/// Issues a receipt derived from the root; stands in for an on-chain venue.
struct LocalAttestor;

#[async_trait]
impl Attestor for LocalAttestor {
    async fn attest(&self, root: &str, _metadata: &Value) -> VeritrailResult<Receipt> {
        Ok(Receipt(format!("local:{}", root.get(..16).unwrap_or(root))))
    }
}

fn wallet_tools() -> ToolRegistry {
    let balance = Arc::new(Mutex::new(OPENING_BALANCE_ETH));
    let mut registry = ToolRegistry::new();

    let read = balance.clone();
    registry.register(Tool::blocking(
        "get_balance",
        "Get the current ETH balance of the agent's wallet.",
        json!({ "type": "object", "properties": {} }),
        EventKind::Observation,
        move |_| {
            let eth = *read.lock().map_err(|e| ToolError::Failed(e.to_string()))?;
            Ok(json!({ "balance_eth": eth, "address": DEMO_ADDRESS }))
        },
    ));

    registry.register(Tool::asynchronous(
        "get_price",
        "Get the spot price of a trading pair.",
        json!({
            "type": "object",
            "properties": { "pair": { "type": "string" } },
            "required": ["pair"]
        }),
        EventKind::Observation,
        |params| async move {
            match params["pair"].as_str() {
                Some("ETH/USD") => Ok(json!({ "pair": "ETH/USD", "price_usd": 2500.0 })),
                Some(other) => Err(ToolError::Failed(format!("no market for {other}"))),
                None => Err(ToolError::InvalidParams("pair is required".to_string())),
            }
        },
    ));

    let wallet = balance;
    let sent = Arc::new(Mutex::new(0u64));
    registry.register(Tool::blocking(
        "transfer",
        "Send ETH from the agent's wallet.",
        json!({
            "type": "object",
            "properties": {
                "to": { "type": "string" },
                "amount": { "type": "number", "exclusiveMinimum": 0 }
            },
            "required": ["to", "amount"]
        }),
        EventKind::Action,
        move |params| {
            let amount = params["amount"].as_f64().unwrap_or(0.0);
            let mut eth = wallet.lock().map_err(|e| ToolError::Failed(e.to_string()))?;
            if amount > *eth {
                return Err(ToolError::Failed(format!(
                    "insufficient funds: balance {} ETH, requested {amount} ETH",
                    *eth
                )));
            }
            *eth -= amount;

            let mut nonce = sent.lock().map_err(|e| ToolError::Failed(e.to_string()))?;
            *nonce += 1;
            Ok(json!({
                "status": "success",
                "to": params["to"],
                "amount": amount,
                "tx_hash": format!("0x{:064x}", *nonce),
            }))
        },
    ));

    registry
}

// ── Entry point ───────────────────────────────────────────────────────────────

pub async fn run(out: &Path, checkpoint: Option<&Path>, config: Option<&Path>) -> VeritrailResult<bool> {
    let config = match config {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig::default(),
    };

    let recorder = Recorder::new("demo-session");
    if let Some(path) = checkpoint {
        recorder.add_listener(Arc::new(JsonlCheckpoint::create(path)?));
    }

    println!();
    println!("VERITRAIL offline demo");
    println!("======================");
    println!("Objective: {OBJECTIVE}");
    println!();

    let mission = MissionLoop::new(recorder.clone(), Arc::new(ScriptedBrain::new()), wallet_tools())
        .with_config(config.mission)
        .with_attestor(Arc::new(LocalAttestor));
    let outcome = mission.run(OBJECTIVE).await;

    for event in recorder.events() {
        println!("  [{:<11}] {:<12} {}", event.kind, event.tool_name, event.output);
    }
    println!();
    println!("Status:      {}", outcome.status);
    println!("Steps:       {}", outcome.steps);
    println!("Events:      {}", outcome.event_count);
    println!("Root:        {}", outcome.final_root);
    if let Some(receipt) = &outcome.receipt {
        println!("Receipt:     {}", receipt.0);
    }

    let export = recorder.export_session();
    export.write_to_file(out)?;
    println!("Session written to {}", out.display());

    let report = SessionVerifier::with_config(config.verify).verify(&export);
    let verdict = if report.valid { "PASS" } else { "FAIL" };
    println!("{verdict}: {}", report.summary);
    println!();
    println!("Check it yourself:  veritrail verify {}", out.display());
    println!("Transfers went to {BURN_ADDRESS}.");

    Ok(report.valid)
}
