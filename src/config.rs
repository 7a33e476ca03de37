use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::models::Period;
use crate::service::{ErpNumberScheme, MatchOptions, SignHandling, DEFAULT_TOLERANCE};
use crate::source::{AfipCsvSource, SheetLookup, SpreadsheetXmlSource};

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sources: SourcesConfig,
    pub matching: MatchingConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// POST /api/compare 请求体上限 (字节)
    pub max_upload_bytes: usize,
}

/// 两个数据源的文件位置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub tax_csv: PathBuf,
    pub erp_xml: PathBuf,
}

/// 匹配策略
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub tolerance: f64,
    pub erp_sign: SignHandling,
    pub erp_number: ErpNumberScheme,
    pub sheet_lookup: SheetLookup,
}

/// 报表输出; 文件名中的 `{year}` / `{month}` 会被替换
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    pub general_file: String,
    pub differences_file: String,
    pub decimal_comma: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_upload_bytes: ServerConfig::DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            tax_csv: PathBuf::from("afip.csv"),
            erp_xml: PathBuf::from("erp.xml"),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            erp_sign: SignHandling::default(),
            erp_number: ErpNumberScheme::default(),
            sheet_lookup: SheetLookup::default(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            general_file: "comparativo_{year}-{month}.csv".to_string(),
            differences_file: "diferencias_{year}-{month}.csv".to_string(),
            decimal_comma: true,
        }
    }
}

impl ServerConfig {
    /// 64 MiB
    pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;
}

impl MatchingConfig {
    pub fn options(&self) -> MatchOptions {
        MatchOptions {
            tolerance: self.tolerance,
            erp_sign: self.erp_sign,
            erp_number: self.erp_number,
        }
    }
}

impl ReportConfig {
    pub fn general_path(&self, period: Period) -> PathBuf {
        self.output_dir.join(render_file_name(&self.general_file, period))
    }

    pub fn differences_path(&self, period: Period) -> PathBuf {
        self.output_dir.join(render_file_name(&self.differences_file, period))
    }
}

fn render_file_name(template: &str, period: Period) -> String {
    template
        .replace("{year}", &period.year().to_string())
        .replace("{month}", &format!("{:02}", period.month()))
}

impl AppConfig {
    pub const DEFAULT_FILE: &'static str = "iva-recon.toml";
    pub const ENV_PREFIX: &'static str = "IVA_RECON";

    /// 加载配置: 默认值 -> 配置文件 -> 环境变量 (IVA_RECON_SERVER__PORT=9000)
    ///
    /// 指定 `path` 时文件必须存在; 否则只在当前目录存在 `iva-recon.toml` 时读取。
    pub fn load(path: Option<&Path>) -> Result<Self, ReconError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::from(Path::new(Self::DEFAULT_FILE)).required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(Self::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// 从 TOML 文本加载 (不读环境变量)
    pub fn from_toml_str(text: &str) -> Result<Self, ReconError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn match_options(&self) -> MatchOptions {
        self.matching.options()
    }

    pub fn tax_source(&self) -> AfipCsvSource {
        AfipCsvSource::from_path(&self.sources.tax_csv)
    }

    pub fn erp_source(&self) -> SpreadsheetXmlSource {
        SpreadsheetXmlSource::from_path(&self.sources.erp_xml, self.matching.sheet_lookup)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
