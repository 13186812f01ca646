//! Index valuation collector CLI.

use clap::{Parser, Subcommand};
use valuation_collector::{modules, CollectorConfig, CollectorError};
use valuation_core::{init_logging, LogConfig, LogFormat};
use valuation_notification::DingTalkSender;

#[derive(Parser)]
#[command(name = "valuation-collector")]
#[command(about = "Index valuation collector (Excel → API → snapshot, DingTalk report)", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// 로그 형식 (pretty, json, compact)
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// 지수별 리포트 작성 및 DingTalk 전송
    Run {
        /// 특정 지수만 처리 (쉼표로 구분, 예: "H30269,930955")
        #[arg(long)]
        codes: Option<String>,

        /// 알림을 보내지 않고 리포트만 작성
        #[arg(long)]
        dry_run: bool,
    },

    /// 지수 하나의 지표를 조회하여 JSON으로 출력
    Fetch {
        /// 지수 코드
        code: String,
    },

    /// 설정된 지수 목록 출력
    ListIndexes,

    /// DingTalk webhook 연결 테스트
    TestWebhook,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 설정 로드 (.env 포함)
    let config = CollectorConfig::from_env()?;

    // 로깅 초기화
    init_logging(LogConfig::new(cli.log_level.as_str()).with_format(cli.log_format))?;

    tracing::info!("Valuation Collector 시작");
    tracing::debug!(
        indexes = config.indexes.len(),
        snapshot_dir = %config.snapshot_dir.display(),
        api_configured = config.api.url.is_some(),
        bond_configured = config.bond.url.is_some(),
        report_dir = ?config.report.output_dir,
        "설정 로드 완료"
    );

    match cli.command {
        Commands::Run { codes, dry_run } => {
            let indexes = match codes {
                Some(codes) => {
                    let codes: Vec<String> = codes
                        .split(',')
                        .map(|c| c.trim().to_string())
                        .filter(|c| !c.is_empty())
                        .collect();
                    config.indexes.select(&codes)?
                }
                None => config.indexes.all().to_vec(),
            };

            let pipeline = modules::build_pipeline(&config).await?;
            let notifier = modules::build_notifier();

            let stats =
                modules::run_valuation_reports(&pipeline, &notifier, &indexes, &config, dry_run)
                    .await?;
            stats.log_summary("밸류에이션 리포트");

            for line in &stats.details {
                tracing::info!("{}", line);
            }

            // 시스템 오류 알림은 워크플로우에서 이미 전송됨
            if stats.all_failed() {
                return Err(CollectorError::DataSource(format!(
                    "모든 지수 수집 실패 ({}건)",
                    stats.total
                ))
                .into());
            }
        }
        Commands::Fetch { code } => {
            let pipeline = modules::build_pipeline(&config).await?;
            let record = pipeline.fetch(&code).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::ListIndexes => {
            for index in config.indexes.all() {
                match &index.url {
                    Some(url) => println!("{}\t{}\t{}", index.code, index.name, url),
                    None => println!("{}\t{}", index.code, index.name),
                }
            }
        }
        Commands::TestWebhook => {
            let sender = DingTalkSender::from_env().ok_or_else(|| {
                CollectorError::Config("DINGTALK_WEBHOOK 환경변수가 설정되지 않았습니다".to_string())
            })??;
            sender.test_connection().await?;
            tracing::info!("DingTalk 연결 테스트 성공");
        }
    }

    tracing::info!("Valuation Collector 종료");

    Ok(())
}
