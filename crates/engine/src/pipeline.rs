//! End-to-end run: read, decode, transform, encode, write.

use crate::encoding::TextEncoding;
use crate::loader::PluginLoader;
use crate::output::{encode_output, OutputFormat};
use crate::transform::{TransformEngine, TransformReport};
use rebundle_common::hash::short_digest;
use rebundle_common::Result;
use rebundle_format::{validate_layout, Bundle};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Options for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Input bundle, relative to `cwd`. Stdin when absent.
    pub input: Option<PathBuf>,
    /// Output path, relative to `cwd`. Stdout when absent.
    pub output: Option<PathBuf>,
    /// Explicit format name. Inferred from `output` when absent.
    pub format: Option<String>,
    /// Text encoding name for wrapped formats.
    pub encoding: String,
    /// Plugin specs in application order.
    pub plugins: Vec<String>,
    /// Directory relative paths are resolved against.
    pub cwd: PathBuf,
}

impl PipelineConfig {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            input: None,
            output: None,
            format: None,
            encoding: TextEncoding::default().to_string(),
            plugins: Vec::new(),
            cwd: cwd.into(),
        }
    }
}

/// What a completed run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub format: OutputFormat,
    pub encoding: TextEncoding,
    pub report: TransformReport,
    pub bytes_written: usize,
    /// Output file, or `None` for stdout.
    pub destination: Option<PathBuf>,
}

/// A validated run, ready to execute.
pub struct Pipeline {
    config: PipelineConfig,
    format: OutputFormat,
    encoding: TextEncoding,
    engine: TransformEngine,
}

impl Pipeline {
    /// Validate options and load plugins. No input is read here, so a bad
    /// format or encoding is reported before any I/O happens.
    pub fn prepare(config: PipelineConfig, loader: &dyn PluginLoader) -> Result<Self> {
        let format = OutputFormat::resolve(config.format.as_deref(), config.output.as_deref())?;
        let encoding: TextEncoding = config.encoding.parse()?;
        debug!("Output format {} ({})", format, encoding);

        let plugins = loader.load_all(&config.plugins)?;
        if !plugins.is_empty() {
            info!("Loaded {} plugins", plugins.len());
        }

        Ok(Self {
            config,
            format,
            encoding,
            engine: TransformEngine::new(plugins),
        })
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Transform a bundle buffer into output bytes without touching the
    /// filesystem.
    pub async fn transform(&self, input: &[u8]) -> Result<(Vec<u8>, TransformReport)> {
        let mut bundle = Bundle::from_bytes(input)?;
        if let Ok(layout) = validate_layout(input) {
            for warning in &layout.warnings {
                warn!("Input bundle: {}", warning);
            }
        }
        debug!("Read bundle with {} entries", bundle.len());

        let report = self.engine.run(&mut bundle).await?;

        let serialized = bundle.to_bytes()?;
        let output = encode_output(&serialized, self.format, self.encoding)?;
        debug!(
            "Encoded {} bytes as {} (sha256 {})",
            serialized.len(),
            self.format,
            short_digest(&output)
        );
        Ok((output, report))
    }

    /// Run the whole pipeline. Output is written only after every step
    /// succeeded.
    pub async fn run(&self) -> Result<RunSummary> {
        let input = self.read_input().await?;
        let (output, report) = self.transform(&input).await?;
        let destination = self.write_output(&output).await?;

        Ok(RunSummary {
            format: self.format,
            encoding: self.encoding,
            report,
            bytes_written: output.len(),
            destination,
        })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.config.cwd.join(path)
    }

    async fn read_input(&self) -> Result<Vec<u8>> {
        match &self.config.input {
            Some(file) => {
                let path = self.resolve(file);
                debug!("Reading bundle from {:?}", path);
                Ok(tokio::fs::read(&path).await?)
            }
            None => {
                debug!("Reading bundle from stdin");
                let mut buf = Vec::new();
                tokio::io::stdin().read_to_end(&mut buf).await?;
                Ok(buf)
            }
        }
    }

    async fn write_output(&self, data: &[u8]) -> Result<Option<PathBuf>> {
        match &self.config.output {
            Some(out) => {
                let path = self.resolve(out);
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, data).await?;
                info!("Wrote {} bytes to {:?}", data.len(), path);
                Ok(Some(path))
            }
            None => {
                let mut stdout = tokio::io::stdout();
                stdout.write_all(data).await?;
                stdout.flush().await?;
                Ok(None)
            }
        }
    }
}
