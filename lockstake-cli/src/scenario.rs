//! Scripted scenarios: an engine config, seeded accounts and an ordered list
//! of steps, all from one TOML file.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use lockstake_core::domain::{amount_repr, AccountId, Amount, Seconds};
use lockstake_core::engine::Capability;
use lockstake_core::external::{FungibleAsset, ManualClock};
use lockstake_core::{Command, EngineConfig, Receipt, Sequencer, StakingEngine};

const DEFAULT_START: Seconds = 1_700_000_000;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Unix time the manual clock starts at.
    #[serde(default = "default_start")]
    pub start_time: Seconds,
    #[serde(default)]
    pub engine: EngineConfig,
    /// Accounts granted every admin capability.
    #[serde(default)]
    pub admins: Vec<AccountId>,
    #[serde(default)]
    pub lending_module: Option<AccountId>,
    #[serde(default)]
    pub accounts: Vec<AccountSeed>,
    /// Stop at the first rejected step instead of reporting and moving on.
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_start() -> Seconds {
    DEFAULT_START
}

/// An account minted `balance` up front, with the engine allowed to pull
/// all of it.
#[derive(Debug, Deserialize)]
pub struct AccountSeed {
    pub name: AccountId,
    #[serde(with = "amount_repr")]
    pub balance: Amount,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Step {
    Setup(SetupStep),
    Engine(Command),
}

/// Asset-side actions that are not engine operations.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SetupStep {
    Mint {
        to: AccountId,
        #[serde(with = "amount_repr")]
        amount: Amount,
    },
    Allow {
        owner: AccountId,
        #[serde(with = "amount_repr")]
        amount: Amount,
    },
}

#[derive(Debug, Default)]
pub struct ScenarioReport {
    pub receipts: Vec<Receipt>,
    pub setup_steps: usize,
}

impl ScenarioReport {
    pub fn rejected(&self) -> usize {
        self.receipts.iter().filter(|r| !r.is_ok()).count()
    }
}

impl Scenario {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let scenario: Scenario = toml::from_str(text).context("invalid scenario TOML")?;
        scenario.engine.validate()?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// Build the engine, seed accounts and run every step in order.
    pub fn run(self) -> Result<(Sequencer, ScenarioReport)> {
        let clock = ManualClock::new(self.start_time);
        let mut engine = StakingEngine::in_memory(self.engine, Arc::new(clock.clone()))?;
        let spender = engine.config().engine_account.clone();

        for admin in &self.admins {
            for capability in Capability::ALL {
                engine.grant(admin, capability);
            }
        }
        if let Some(module) = self.lending_module {
            engine.register_lending_module(module);
        }
        for seed in &self.accounts {
            engine.asset_mut().mint(&seed.name, seed.balance)?;
            engine
                .asset_mut()
                .approve(&seed.name, &spender, seed.balance);
        }

        let sequencer = Sequencer::new(engine).with_manual_clock(clock);
        let mut report = ScenarioReport::default();
        for (index, step) in self.steps.into_iter().enumerate() {
            match step {
                Step::Setup(setup) => {
                    sequencer.with_engine_mut(|engine| apply_setup(engine, &spender, setup))?;
                    report.setup_steps += 1;
                }
                Step::Engine(command) => {
                    let receipt = sequencer.submit(command);
                    if let Err(err) = &receipt.outcome {
                        warn!(step = index + 1, seq = receipt.seq, error = %err, "step rejected");
                        if self.strict {
                            anyhow::bail!(
                                "step {} ({}) rejected: {err}",
                                index + 1,
                                receipt.command.name()
                            );
                        }
                    }
                    report.receipts.push(receipt);
                }
            }
        }
        info!(
            commands = report.receipts.len(),
            rejected = report.rejected(),
            setup = report.setup_steps,
            "scenario finished"
        );
        Ok((sequencer, report))
    }
}

fn apply_setup(engine: &mut StakingEngine, spender: &AccountId, step: SetupStep) -> Result<()> {
    match step {
        SetupStep::Mint { to, amount } => engine.asset_mut().mint(&to, amount)?,
        SetupStep::Allow { owner, amount } => engine.asset_mut().approve(&owner, spender, amount),
    }
    Ok(())
}
