use crate::commands::{open_pool, prepare, CommandResult, StepFailure};
use gatekeep_db::{migrations, DemoDataset, SeedResult};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seeded = DemoDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let present = DemoDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        pool.close().await;
        if present {
            Ok::<SeedResult, StepFailure>(seeded)
        } else {
            Err(("seed_verification", "some demo documents are missing after seeding".into(), 6))
        }
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", render_summary(&seeded)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn render_summary(seeded: &SeedResult) -> String {
    let lines: Vec<String> = seeded
        .entities
        .iter()
        .map(|entity| {
            format!("  - {}: {} (created by {})", entity.kind, entity.id, entity.creator_id)
        })
        .collect();
    format!(
        "demo dataset ready ({} inserted, {} already present):\n{}",
        seeded.inserted,
        seeded.skipped,
        lines.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use gatekeep_core::domain::entity::EntityKind;
    use gatekeep_db::fixtures::SeededEntity;
    use gatekeep_db::SeedResult;

    use super::render_summary;

    #[test]
    fn summary_lists_every_seeded_document() {
        let seeded = SeedResult {
            inserted: 1,
            skipped: 1,
            entities: vec![
                SeededEntity { kind: EntityKind::PurchaseOrder, id: "po-1", creator_id: "u-1" },
                SeededEntity { kind: EntityKind::Production, id: "prod-1", creator_id: "u-2" },
            ],
        };

        assert_eq!(
            render_summary(&seeded),
            "demo dataset ready (1 inserted, 1 already present):\n  \
             - purchase_order: po-1 (created by u-1)\n  \
             - production: prod-1 (created by u-2)"
        );
    }
}
