use chrono::NaiveDate;
use dext3r::{Dext3r, Dext3rError, DownloadConfig};

#[tokio::main]
async fn main() -> Result<(), Dext3rError> {
    env_logger::init();
    let client = Dext3r::new().await?;

    // Daily mean temperature since 1961
    let config = DownloadConfig::builder()
        .emails(vec!["someone@example.org".to_string()])
        .variables(vec!["B12101".to_string()])
        .agg_codes(vec![3])
        .agg_span(86400)
        .from_date(NaiveDate::from_ymd_opt(1961, 1, 1).unwrap())
        .to_date(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap())
        .build()?;

    let plan = client.plan(&config).await?;
    println!("{} unit(s) in {} batch(es)", plan.units, plan.batches.len());
    for batch in plan.batches.iter().take(5) {
        println!(
            "{} station(s), {} point(s): {:?}",
            batch.len(),
            batch.total_size(),
            batch.station_names()
        );
    }
    Ok(())
}
