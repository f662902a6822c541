//! CSV export of position records from a snapshot.

use anyhow::{Context, Result};

use lockstake_core::engine::{pending_for, EngineState};
use lockstake_core::Snapshot;

/// One row per position, closed ones included.
///
/// Columns: id, owner, active, principal, lock_duration, multiplier_bps,
/// start_time, last_claim_time, unlock_time, pending_rewards. Pending rewards
/// are evaluated at the snapshot's `taken_at`.
pub fn positions_csv(snapshot: &Snapshot) -> Result<String> {
    let state: &EngineState = &snapshot.state;
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "id",
        "owner",
        "active",
        "principal",
        "lock_duration",
        "multiplier_bps",
        "start_time",
        "last_claim_time",
        "unlock_time",
        "pending_rewards",
    ])?;

    for record in state.ledger().records() {
        let owner = state
            .ledger()
            .token()
            .owner_of(record.id)
            .map(|o| o.to_string())
            .unwrap_or_default();
        let pending = pending_for(record, state.apy(), snapshot.taken_at)?;
        wtr.write_record([
            &record.id.value().to_string(),
            &owner,
            &record.active.to_string(),
            &record.principal.to_string(),
            &record.lock_duration.to_string(),
            &record.multiplier.value().to_string(),
            &record.start_time.to_string(),
            &record.last_claim_time.to_string(),
            &record.unlock_time().to_string(),
            &pending.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Scenario;

    #[test]
    fn closed_positions_have_no_owner() {
        let scenario = Scenario::from_toml_str(
            r#"
            [engine]
            lock_periods = [{ duration = 60, multiplier_bps = 10000 }]

            [[accounts]]
            name = "alice"
            balance = 300

            [[steps]]
            op = "open"
            caller = "alice"
            amount = 100
            lock_duration = 60

            [[steps]]
            op = "open"
            caller = "alice"
            amount = 200
            lock_duration = 60

            [[steps]]
            op = "advance_time"
            seconds = 60

            [[steps]]
            op = "close"
            caller = "alice"
            id = 1
            "#,
        )
        .unwrap();
        let (sequencer, report) = scenario.run().unwrap();
        assert_eq!(report.rejected(), 0);
        let snapshot = sequencer.with_engine(|engine| engine.snapshot()).unwrap();

        let csv = positions_csv(&snapshot).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,owner,active,principal"));
        assert!(lines[1].starts_with("1,,false,100,60,10000"));
        assert!(lines[2].starts_with("2,alice,true,200,60,10000"));
    }
}
