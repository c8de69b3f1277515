use anyhow::Context;
use sqlx::PgPool;

use crate::models::ForecastOutcome;
use crate::pipeline::RunOutput;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Stores one run's tables. A run with the same id replaces the earlier copy.
pub async fn persist_run(pool: &PgPool, output: &RunOutput) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await.context("failed to open transaction")?;

    sqlx::query("DELETE FROM revenue_studio.runs WHERE run_id = $1")
        .bind(output.run_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO revenue_studio.runs (run_id, evaluation_date, forecasted, unavailable)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(output.run_id)
    .bind(output.evaluation_date)
    .bind(output.available_forecasts().count() as i32)
    .bind(output.unavailable_count() as i32)
    .execute(&mut *tx)
    .await?;

    for pace in &output.pace {
        sqlx::query(
            r#"
            INSERT INTO revenue_studio.pace_analysis
            (run_id, sailing_id, region, evaluation_date, days_before_departure,
             current_occupancy, benchmark_occupancy, pace_gap, benchmark_source, checkpoint_pace_gap)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(output.run_id)
        .bind(&pace.sailing_id)
        .bind(pace.region.as_str())
        .bind(pace.evaluation_date)
        .bind(pace.days_before_departure as i32)
        .bind(pace.current_occupancy)
        .bind(pace.benchmark_occupancy)
        .bind(pace.pace_gap)
        .bind(pace.benchmark_source.as_str())
        .bind(pace.checkpoint_pace_gap)
        .execute(&mut *tx)
        .await?;
    }

    for outcome in &output.forecasts {
        let query = sqlx::query(
            r#"
            INSERT INTO revenue_studio.revenue_forecast
            (run_id, sailing_id, region, status, current_occupancy, completion_ratio,
             projected_occupancy, projected_revenue, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(output.run_id);

        let query = match outcome {
            ForecastOutcome::Available(record) => query
                .bind(&record.sailing_id)
                .bind(record.region.as_str())
                .bind("available")
                .bind(Some(record.current_occupancy))
                .bind(Some(record.completion_ratio))
                .bind(Some(record.projected_occupancy))
                .bind(Some(record.projected_revenue))
                .bind(""),
            ForecastOutcome::Unavailable {
                sailing_id,
                region,
                reason,
            } => query
                .bind(sailing_id)
                .bind(region.as_str())
                .bind("unavailable")
                .bind(None::<f64>)
                .bind(None::<f64>)
                .bind(None::<f64>)
                .bind(None::<f64>)
                .bind(reason),
        };
        query.execute(&mut *tx).await?;
    }

    for record in &output.classifications {
        sqlx::query(
            r#"
            INSERT INTO revenue_studio.sailing_classification
            (run_id, sailing_id, region, category, flags, action, recommendation)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(output.run_id)
        .bind(&record.sailing_id)
        .bind(record.region.as_str())
        .bind(record.category.as_str())
        .bind(serde_json::to_value(&record.flags)?)
        .bind(record.action.as_str())
        .bind(&record.recommendation)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await.context("failed to commit run")?;
    Ok(output.forecasts.len())
}
