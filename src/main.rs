use std::path::PathBuf;
use std::sync::Arc;

use client_onboarding::cli::{Console, ConsoleScanner, FilePhotoCapture, run_session};
use client_onboarding::config::{HostedConfig, OnboardingConfig};
use client_onboarding::onboarding::{OnboardingDeps, OnboardingWorkflow};
use client_onboarding::store::{
    AuthProvider, FileStore, HostedBackend, IdentityStore, LibSqlIdentityStore, LocalFileStore,
    MemoryAuthProvider, MemoryIdentityStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    eprintln!("🪪 Client onboarding v{}", env!("CARGO_PKG_VERSION"));

    let (identities, auth, files): (
        Arc<dyn IdentityStore>,
        Arc<dyn AuthProvider>,
        Arc<dyn FileStore>,
    ) = if std::env::var("ONBOARD_BACKEND_URL").is_ok() {
        let config = HostedConfig::from_env()?;
        eprintln!("   Backend: {}", config.base_url);
        let backend = Arc::new(HostedBackend::new(config)?);
        let identities: Arc<dyn IdentityStore> = backend.clone();
        let auth: Arc<dyn AuthProvider> = backend.clone();
        let files: Arc<dyn FileStore> = backend;
        (identities, auth, files)
    } else {
        let identities: Arc<dyn IdentityStore> = match std::env::var("ONBOARD_DB_PATH") {
            Ok(path) => {
                eprintln!("   Database: {path}");
                Arc::new(LibSqlIdentityStore::new_local(&PathBuf::from(path)).await?)
            }
            Err(_) => {
                eprintln!("   Database: in-memory (set ONBOARD_DB_PATH to persist)");
                Arc::new(MemoryIdentityStore::new())
            }
        };
        let files_dir =
            std::env::var("ONBOARD_FILES_DIR").unwrap_or_else(|_| "./data/photos".to_string());
        let public_url = std::env::var("ONBOARD_PUBLIC_URL")
            .unwrap_or_else(|_| format!("file://{files_dir}"));
        eprintln!("   Photos: {files_dir}");
        eprintln!("   Accounts: in-memory");
        let auth: Arc<dyn AuthProvider> = Arc::new(MemoryAuthProvider::new());
        let files: Arc<dyn FileStore> = Arc::new(LocalFileStore::new(files_dir, public_url));
        (identities, auth, files)
    };
    eprintln!("   Ctrl-D to exit.\n");

    let console = Arc::new(Console::stdin());
    let deps = OnboardingDeps {
        identities,
        auth,
        files,
        scanner: Arc::new(ConsoleScanner::new(console.clone())),
        camera: Arc::new(FilePhotoCapture::new(console.clone())),
    };
    let mut workflow = OnboardingWorkflow::new(deps, OnboardingConfig::default());

    run_session(&mut workflow, &console).await?;
    tracing::info!("Session ended");
    Ok(())
}
