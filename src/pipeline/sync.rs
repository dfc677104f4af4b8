// src/pipeline/sync.rs

//! One idempotent catalog synchronization run.
//!
//! ```text
//! FETCH ─┬─ 304 ─> REUSE previous bundle
//!        └─ 2xx ─> DETECT > PARSE > NORMALIZE > BUILD > HASH ─┬─ same ─> SKIP
//!                                                             └─ new ──> ENCODE > WRITE
//! ```
//!
//! Every error aborts the run before WRITE, so the previous output is either
//! replaced atomically or left untouched.

use std::path::PathBuf;

use serde::Serialize;

use crate::codec::{from_script, to_script};
use crate::error::{AppError, Result};
use crate::models::{Bundle, SourceConfig, SyncMode};
use crate::pipeline::catalog::Catalog;
use crate::source::{
    FetchOutcome, FetchRequest, SourceFetcher, SourceResponse, detect_source_kind,
    ensure_kind_allowed,
};
use crate::storage::ArtifactStorage;

/// Kind reported when the source answered 304.
pub const NOT_MODIFIED_KIND: &str = "not_modified";

/// Everything one run needs, passed explicitly.
#[derive(Debug, Clone)]
pub struct SyncContext {
    pub source: SourceConfig,
    /// Bundle script location, relative to the storage root or absolute
    pub output_path: PathBuf,
}

impl SyncContext {
    pub fn new(source: SourceConfig, output_path: impl Into<PathBuf>) -> Self {
        Self {
            source,
            output_path: output_path.into(),
        }
    }

    fn output_key(&self) -> String {
        self.output_path.to_string_lossy().into_owned()
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub output_path: String,
    /// Detected source kind, or `not_modified`
    pub kind: String,
    pub content_type: String,
    pub row_count: usize,
    pub source: String,
    pub generated_at: String,
    pub changed: bool,
    pub data_hash: String,
    pub secured: bool,
    pub mode: SyncMode,
}

/// A bundle from an earlier run, decoded when possible.
struct Previous<D> {
    bundle: Bundle,
    dataset: Option<D>,
}

async fn load_previous<C, S>(catalog: &C, storage: &S, key: &str) -> Option<Previous<C::Dataset>>
where
    C: Catalog,
    S: ArtifactStorage,
{
    let text = match storage.read_text(key).await {
        Ok(Some(text)) => text,
        Ok(None) => return None,
        Err(e) => {
            log::warn!("Ignoring unreadable previous {} bundle: {e}", catalog.label());
            return None;
        }
    };
    let bundle = match from_script(&text, catalog.bundle_var()) {
        Ok(bundle) => bundle,
        Err(e) => {
            log::warn!("Ignoring malformed previous {} bundle: {e}", catalog.label());
            return None;
        }
    };
    let dataset = match catalog.decode(&bundle) {
        Ok(dataset) => Some(dataset),
        Err(e) => {
            log::info!("Previous {} bundle cannot be reused: {e}", catalog.label());
            None
        }
    };
    Some(Previous { bundle, dataset })
}

/// Run one synchronization of `catalog` into `ctx.output_path`.
pub async fn run_sync<C, F, S>(
    catalog: &C,
    fetcher: &F,
    storage: &S,
    ctx: &SyncContext,
) -> Result<SyncReport>
where
    C: Catalog,
    F: SourceFetcher + ?Sized,
    S: ArtifactStorage,
{
    let label = catalog.label();
    ctx.source.validate()?;
    let url = ctx.source.require_url(label)?.to_string();
    let allowed = ctx.source.allowed_kinds()?;
    let key = ctx.output_key();

    let previous = load_previous(catalog, storage, &key).await;

    let mut request = FetchRequest::new(&url).with_token(ctx.source.bearer_token());
    if let Some(prev) = &previous {
        let meta = &prev.bundle.meta;
        request = request.with_validators(&meta.source_etag, &meta.source_last_modified);
    }

    log::info!("Fetching {label} source {url}");
    let response = match fetcher.fetch(&request, &ctx.source).await? {
        FetchOutcome::Fetched(response) => response,
        FetchOutcome::NotModified => {
            if let Some(Previous {
                bundle,
                dataset: Some(dataset),
            }) = &previous
            {
                log::info!("{label} source not modified; keeping {key}");
                let data_hash = catalog.data_hash(dataset)?;
                return Ok(SyncReport {
                    output_path: key,
                    kind: NOT_MODIFIED_KIND.to_string(),
                    content_type: String::new(),
                    row_count: catalog.row_count(dataset),
                    source: url,
                    generated_at: bundle.meta.generated_at.clone(),
                    changed: false,
                    data_hash,
                    secured: bundle.secured,
                    mode: catalog.mode(),
                });
            }

            log::warn!(
                "{label} source not modified but the previous bundle is unusable; refetching"
            );
            match fetcher.fetch(&request.unconditional(), &ctx.source).await? {
                FetchOutcome::Fetched(response) => response,
                FetchOutcome::NotModified => {
                    return Err(AppError::format(
                        "Source answered 304 Not Modified to an unconditional request",
                    ));
                }
            }
        }
    };

    let SourceResponse {
        content_type,
        etag,
        last_modified,
        body,
    } = response;

    let kind = detect_source_kind(&url, &content_type);
    ensure_kind_allowed(kind, &allowed, label)?;

    let dataset = catalog.build(kind, &body)?;
    let data_hash = catalog.data_hash(&dataset)?;
    let row_count = catalog.row_count(&dataset);
    log::info!("Parsed {row_count} {label} entries from {kind} source");

    let previous_hash = match &previous {
        Some(Previous {
            dataset: Some(prev), ..
        }) => Some(catalog.data_hash(prev)?),
        _ => None,
    };

    let unchanged = previous_hash.as_deref() == Some(data_hash.as_str());
    if let Some(prev) = previous.as_ref().filter(|_| unchanged) {
        log::info!("{label} data unchanged ({data_hash}); {key} left as is");
        return Ok(SyncReport {
            output_path: key,
            kind: kind.as_str().to_string(),
            content_type,
            row_count,
            source: url,
            generated_at: prev.bundle.meta.generated_at.clone(),
            changed: false,
            data_hash,
            secured: prev.bundle.secured,
            mode: catalog.mode(),
        });
    }

    let mut bundle = catalog.encode(&dataset)?;
    bundle.meta.source = url.clone();
    bundle.meta.data_hash = data_hash.clone();
    bundle.meta.source_etag = etag;
    bundle.meta.source_last_modified = last_modified;
    bundle.meta.mode = Some(catalog.mode());

    let script = to_script(catalog.bundle_var(), &bundle)?;
    storage.write_bytes(&key, script.as_bytes()).await?;
    log::info!("Wrote {label} bundle {key} ({} bytes)", script.len());

    Ok(SyncReport {
        output_path: key,
        kind: kind.as_str().to_string(),
        content_type,
        row_count,
        source: url,
        generated_at: bundle.meta.generated_at,
        changed: true,
        data_hash,
        secured: bundle.secured,
        mode: catalog.mode(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::codec::{PRICE_BUNDLE_VAR, STOCK_BUNDLE_VAR};
    use crate::models::SourceKind;
    use crate::pipeline::catalog::{PriceCatalog, StockCatalog};
    use crate::storage::LocalStorage;

    /// Replays canned outcomes and records every request.
    #[derive(Default)]
    struct ScriptedFetcher {
        outcomes: Mutex<VecDeque<Result<FetchOutcome>>>,
        requests: Mutex<Vec<FetchRequest>>,
    }

    impl ScriptedFetcher {
        fn push(&self, outcome: Result<FetchOutcome>) -> &Self {
            self.outcomes.lock().unwrap().push_back(outcome);
            self
        }

        fn body(&self, content_type: &str, etag: &str, body: &str) -> &Self {
            self.push(Ok(FetchOutcome::Fetched(SourceResponse {
                content_type: content_type.to_string(),
                etag: etag.to_string(),
                last_modified: String::new(),
                body: body.as_bytes().to_vec(),
            })))
        }

        fn requests(&self) -> Vec<FetchRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SourceFetcher for ScriptedFetcher {
        async fn fetch(
            &self,
            request: &FetchRequest,
            _config: &SourceConfig,
        ) -> Result<FetchOutcome> {
            self.requests.lock().unwrap().push(request.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::format("no scripted response left")))
        }
    }

    const STOCK_CSV: &str = "物料长代码,发料仓库,库存数量,参考状态\nA001,A仓,12,正常\nA001,B仓,0,\nB002,C仓,3,在途\n";

    fn stock_ctx(url: &str) -> SyncContext {
        SyncContext::new(
            SourceConfig::new(url, &SourceKind::DATA_KINDS),
            "web/stock.bundle.js",
        )
    }

    fn price_ctx(url: &str) -> SyncContext {
        SyncContext::new(
            SourceConfig::new(url, &SourceKind::DATA_KINDS),
            "web/price.bundle.js",
        )
    }

    async fn read_bundle(storage: &LocalStorage, key: &str, var: &str) -> Bundle {
        let text = storage.read_text(key).await.unwrap().unwrap();
        from_script(&text, var).unwrap()
    }

    #[tokio::test]
    async fn test_stock_scenario_and_idempotence() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let fetcher = ScriptedFetcher::default();
        fetcher
            .body("text/csv", "", STOCK_CSV)
            .body("text/csv", "", STOCK_CSV);
        let ctx = stock_ctx("https://example.com/stock.csv");

        let first = run_sync(&StockCatalog, &fetcher, &storage, &ctx).await.unwrap();
        assert!(first.changed);
        assert_eq!(first.kind, "csv");
        assert_eq!(first.row_count, 2);

        let bundle = read_bundle(&storage, "web/stock.bundle.js", STOCK_BUNDLE_VAR).await;
        let dataset = StockCatalog.decode(&bundle).unwrap();
        assert_eq!(dataset.by_code["A001"], "A仓:12(正常)");
        assert_eq!(dataset.by_code["B002"], "C仓:3(在途)");
        assert_eq!(bundle.meta.data_hash, first.data_hash);
        assert_eq!(bundle.meta.source, "https://example.com/stock.csv");

        let path = tmp.path().join("web/stock.bundle.js");
        let bytes_before = std::fs::read(&path).unwrap();
        let mtime_before = std::fs::metadata(&path).unwrap().modified().unwrap();

        let second = run_sync(&StockCatalog, &fetcher, &storage, &ctx).await.unwrap();
        assert!(!second.changed);
        assert_eq!(second.data_hash, first.data_hash);
        assert_eq!(second.generated_at, first.generated_at);
        assert_eq!(std::fs::read(&path).unwrap(), bytes_before);
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), mtime_before);
    }

    #[tokio::test]
    async fn test_hash_changes_with_content() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let fetcher = ScriptedFetcher::default();
        fetcher
            .body("application/json", "", r#"{"byCode":{"01.01.0001":"A仓:12(正常)"}}"#)
            .body(
                "application/json",
                "",
                r#"{"byCode":{"01.01.0001":"A仓:13(正常)","01.01.0002":"B仓:2(在途)"}}"#,
            );
        let ctx = stock_ctx("https://example.com/stock.json");

        let first = run_sync(&StockCatalog, &fetcher, &storage, &ctx).await.unwrap();
        let second = run_sync(&StockCatalog, &fetcher, &storage, &ctx).await.unwrap();
        assert!(first.changed && second.changed);
        assert_ne!(first.data_hash, second.data_hash);

        let bundle = read_bundle(&storage, "web/stock.bundle.js", STOCK_BUNDLE_VAR).await;
        assert_eq!(bundle.meta.data_hash, second.data_hash);
        assert_eq!(bundle.meta.row_count, 2);
    }

    #[tokio::test]
    async fn test_conditional_request_reuses_bundle() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let fetcher = ScriptedFetcher::default();
        fetcher
            .body("text/csv", "\"v1\"", STOCK_CSV)
            .push(Ok(FetchOutcome::NotModified));
        let ctx = stock_ctx("https://example.com/stock.csv");

        let first = run_sync(&StockCatalog, &fetcher, &storage, &ctx).await.unwrap();
        let second = run_sync(&StockCatalog, &fetcher, &storage, &ctx).await.unwrap();

        assert_eq!(second.kind, NOT_MODIFIED_KIND);
        assert!(!second.changed);
        assert_eq!(second.row_count, 2);
        assert_eq!(second.data_hash, first.data_hash);
        assert_eq!(second.generated_at, first.generated_at);

        let requests = fetcher.requests();
        assert_eq!(requests[0].etag, None);
        assert_eq!(requests[1].etag.as_deref(), Some("\"v1\""));
    }

    #[tokio::test]
    async fn test_not_modified_reports_recomputed_hash() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let fetcher = ScriptedFetcher::default();
        fetcher
            .body("text/csv", "\"v1\"", STOCK_CSV)
            .push(Ok(FetchOutcome::NotModified));
        let ctx = stock_ctx("https://example.com/stock.csv");

        let first = run_sync(&StockCatalog, &fetcher, &storage, &ctx).await.unwrap();
        let key = "web/stock.bundle.js";
        let mut bundle = read_bundle(&storage, key, STOCK_BUNDLE_VAR).await;
        bundle.meta.data_hash = "stale".to_string();
        let script = to_script(STOCK_BUNDLE_VAR, &bundle).unwrap();
        storage.write_bytes(key, script.as_bytes()).await.unwrap();

        let second = run_sync(&StockCatalog, &fetcher, &storage, &ctx).await.unwrap();
        assert_eq!(second.kind, NOT_MODIFIED_KIND);
        assert_eq!(second.data_hash, first.data_hash);
    }

    #[tokio::test]
    async fn test_not_modified_with_unusable_bundle_refetches() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let fetcher = ScriptedFetcher::default();
        let csv = "规格型号,销售单价\nS1,10\n";
        fetcher
            .body("text/csv", "\"v1\"", csv)
            .push(Ok(FetchOutcome::NotModified))
            .body("text/csv", "\"v1\"", csv);
        let ctx = price_ctx("https://example.com/price.csv");

        let plain = PriceCatalog::new(SyncMode::Plain, None).unwrap();
        run_sync(&plain, &fetcher, &storage, &ctx).await.unwrap();

        let encrypted = PriceCatalog::new(SyncMode::Encrypted, Some("pw".into())).unwrap();
        let report = run_sync(&encrypted, &fetcher, &storage, &ctx).await.unwrap();
        assert!(report.changed);
        assert!(report.secured);

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[1].is_conditional());
        assert!(!requests[2].is_conditional());
    }

    #[tokio::test]
    async fn test_price_modes() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let fetcher = ScriptedFetcher::default();
        let rows = r#"[{"规格型号":"S1","销售单价":10},{"规格型号":"S1","销售单价":20}]"#;
        fetcher
            .body("application/json", "", rows)
            .body("application/json", "", rows)
            .body("application/json", "", rows);
        let ctx = price_ctx("https://example.com/price.json");

        let encrypted = PriceCatalog::new(SyncMode::Encrypted, Some("pw".into())).unwrap();
        let first = run_sync(&encrypted, &fetcher, &storage, &ctx).await.unwrap();
        assert!(first.changed && first.secured);
        assert_eq!(first.row_count, 1);

        let bundle = read_bundle(&storage, "web/price.bundle.js", PRICE_BUNDLE_VAR).await;
        assert!(bundle.secured);
        assert_eq!(bundle.meta.mode, Some(SyncMode::Encrypted));
        assert_eq!(encrypted.decode(&bundle).unwrap().by_spec["S1"].price, 20.0);

        let again = run_sync(&encrypted, &fetcher, &storage, &ctx).await.unwrap();
        assert!(!again.changed);

        let plain = PriceCatalog::new(SyncMode::Plain, None).unwrap();
        let switched = run_sync(&plain, &fetcher, &storage, &ctx).await.unwrap();
        assert!(switched.changed);
        assert!(!switched.secured);
        assert_eq!(switched.data_hash, first.data_hash);
    }

    #[tokio::test]
    async fn test_failures_leave_output_untouched() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let fetcher = ScriptedFetcher::default();
        fetcher
            .body("text/csv", "", STOCK_CSV)
            .body("text/html; charset=utf-8", "", "<html></html>")
            .push(Err(AppError::Http { status: 500 }))
            .body("application/json", "", r#"{"unexpected":true}"#);
        let ctx = stock_ctx("https://example.com/stock");

        run_sync(&StockCatalog, &fetcher, &storage, &ctx).await.unwrap();
        let path = tmp.path().join("web/stock.bundle.js");
        let before = std::fs::read(&path).unwrap();

        let err = run_sync(&StockCatalog, &fetcher, &storage, &ctx).await.unwrap_err();
        assert!(err.to_string().contains("HTML page"));
        let err = run_sync(&StockCatalog, &fetcher, &storage, &ctx).await.unwrap_err();
        assert!(matches!(err, AppError::Http { status: 500 }));
        let err = run_sync(&StockCatalog, &fetcher, &storage, &ctx).await.unwrap_err();
        assert!(matches!(err, AppError::Format(_)));

        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_disallowed_kind() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let fetcher = ScriptedFetcher::default();
        fetcher.body("text/csv", "", "规格型号,销售单价\nS1,1\n");
        let ctx = SyncContext::new(
            SourceConfig::new("https://example.com/price.csv", &[SourceKind::Xlsx]),
            "price.bundle.js",
        );

        let catalog = PriceCatalog::new(SyncMode::Plain, None).unwrap();
        let err = run_sync(&catalog, &fetcher, &storage, &ctx).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported price source type: csv"));
        assert!(!tmp.path().join("price.bundle.js").exists());
    }

    #[tokio::test]
    async fn test_missing_url_fails_before_fetch() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let fetcher = ScriptedFetcher::default();
        let ctx = stock_ctx("");

        let err = run_sync(&StockCatalog, &fetcher, &storage, &ctx).await.unwrap_err();
        assert!(err.to_string().contains("Missing stock source URL"));
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_previous_bundle_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage
            .write_bytes("web/stock.bundle.js", b"window.STOCK_BUNDLE = garbage;")
            .await
            .unwrap();
        let fetcher = ScriptedFetcher::default();
        fetcher.body("text/csv", "", STOCK_CSV);

        let ctx = stock_ctx("https://example.com/s.csv");
        let report = run_sync(&StockCatalog, &fetcher, &storage, &ctx).await.unwrap();
        assert!(report.changed);
        assert!(!fetcher.requests()[0].is_conditional());
    }
}
