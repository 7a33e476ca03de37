use std::path::PathBuf;

use clap::{Parser, Subcommand};
use iva_recon::{api, models::Period, report, service, AppConfig};
use tracing::info;
use tracing_subscriber::{fmt::time::ChronoLocal, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "iva-recon", version, about = "AFIP / ERP IVA reconciliation")]
struct Args {
    /// 配置文件 (默认读取当前目录下的 iva-recon.toml, 如果存在)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 启动 HTTP 服务 (默认)
    Serve,
    /// 对账一次并写出 CSV 报表
    Report {
        #[arg(long)]
        month: u32,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        tax_csv: Option<PathBuf>,
        #[arg(long)]
        erp_xml: Option<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 使用本地时间格式, RUST_LOG 可覆盖级别
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("iva_recon=info,tower_http=info")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    execute(Args::parse()).await
}

async fn execute(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(AppConfig::load(args.config.as_deref())?).await,
        Commands::Report {
            month,
            year,
            tax_csv,
            erp_xml,
            out_dir,
        } => {
            // 先校验期间, 再读取任何文件 (包括配置文件)
            let period = Period::new(month, year)?;
            let mut config = AppConfig::load(args.config.as_deref())?;
            if let Some(path) = tax_csv {
                config.sources.tax_csv = path;
            }
            if let Some(path) = erp_xml {
                config.sources.erp_xml = path;
            }
            if let Some(dir) = out_dir {
                config.report.output_dir = dir;
            }
            report_once(config, period).await
        }
    }
}

async fn serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting server with config: {:?}", config);

    let addr = config.server_addr();
    let app = api::router(api::AppState::new(config));

    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  GET  /api/compare?month=&year=  - 对账配置中的文件");
    info!("  POST /api/compare               - 对账上传的内容");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn report_once(config: AppConfig, period: Period) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "对账 {}: A = {}, B = {}",
        period,
        config.sources.tax_csv.display(),
        config.sources.erp_xml.display()
    );

    let (reconciliation, paths) = tokio::task::spawn_blocking(move || {
        let reconciliation =
            service::run(&config.tax_source(), &config.erp_source(), period, config.match_options())?;
        let paths = report::export_reports(&reconciliation, &config.report)?;
        Ok::<_, iva_recon::ReconError>((reconciliation, paths))
    })
    .await??;

    let summary = reconciliation.summary();
    println!("Period:          {}", reconciliation.period);
    println!("Rows:            {}", summary.total);
    println!("Matched:         {}", summary.matched);
    println!("Amount mismatch: {}", summary.amount_mismatch);
    println!("Only in A:       {}", summary.only_in_a);
    for (category, count) in &summary.only_in_a_by_category {
        println!("  {:?}: {}", category, count);
    }
    println!("Only in B:       {}", summary.only_in_b);
    println!("VAT diff sum:    {:.2}", summary.vat_diff_sum);
    println!("Total diff sum:  {:.2}", summary.total_diff_sum);
    println!("General report:  {}", paths.general.display());
    println!("Differences:     {}", paths.differences.display());

    if reconciliation.quality.has_warnings() {
        tracing::warn!("数据质量提示: {:?}", reconciliation.quality);
    }
    info!("ERP 单据号长度分布: {:?}", reconciliation.quality.erp_number_lengths);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use iva_recon::ReconError;

    #[tokio::test]
    async fn report_rejects_invalid_period_before_reading_config() {
        let args = Args::try_parse_from([
            "iva-recon",
            "--config",
            "/no/such/iva-recon.toml",
            "report",
            "--month",
            "13",
            "--year",
            "2025",
        ])
        .unwrap();

        let err = execute(args).await.unwrap_err();
        let err = err.downcast_ref::<ReconError>().unwrap();
        assert!(matches!(err, ReconError::InvalidPeriod { month: 13, year: 2025 }));
    }

    #[tokio::test]
    async fn report_reads_config_once_period_is_valid() {
        let args = Args::try_parse_from([
            "iva-recon",
            "report",
            "--config",
            "/no/such/iva-recon.toml",
            "--month",
            "11",
            "--year",
            "2025",
        ])
        .unwrap();

        let err = execute(args).await.unwrap_err();
        let err = err.downcast_ref::<ReconError>().unwrap();
        assert!(matches!(err, ReconError::Config(_)));
    }
}
