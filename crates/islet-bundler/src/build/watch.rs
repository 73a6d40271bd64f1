use std::sync::Arc;

use tracing::info;

use super::{BuildResult, IsletBuild};
use crate::orchestrator::{CompilerId, Orchestrator};
use crate::Result;

/// Repeated builds of one project.
///
/// The orchestrator outlives each build, so the client compiler is kept while
/// the set of universal components stays the same and replaced as soon as it
/// changes. File watching itself is left to the caller.
#[derive(Debug)]
pub struct WatchSession {
    build: IsletBuild,
    orchestrator: Arc<Orchestrator>,
    generation: u64,
}

impl WatchSession {
    pub fn new(build: IsletBuild) -> Result<Self> {
        let orchestrator = build.orchestrator()?;
        Ok(Self {
            build,
            orchestrator,
            generation: 0,
        })
    }

    /// Compile again without writing or rendering.
    pub async fn rebuild(&mut self) -> Result<BuildResult> {
        self.generation += 1;
        let result = self.build.build_with(Arc::clone(&self.orchestrator)).await?;
        info!(
            generation = self.generation,
            compiler = ?self.orchestrator.active_compiler(),
            "rebuild finished"
        );
        Ok(result)
    }

    /// Rebuild, write the outputs and render the templates.
    pub async fn run(&mut self) -> Result<BuildResult> {
        let mut result = self.rebuild().await?;
        self.build.finish(&mut result).await?;
        Ok(result)
    }

    /// Id of the client compiler kept for the next rebuild.
    pub fn active_compiler(&self) -> Option<CompilerId> {
        self.orchestrator.active_compiler()
    }

    /// Number of rebuilds started so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Force the next rebuild to start a fresh client compiler.
    pub fn invalidate(&self) {
        self.orchestrator.reset();
    }

    pub fn build(&self) -> &IsletBuild {
        &self.build
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{
        ClientCompilationConfig, CompilationOutput, Compiler, CompilerFactory,
    };
    use crate::manifest::ChunkManifest;
    use islet_config::IsletConfig;

    #[derive(Debug)]
    struct NoManifest;

    impl CompilerFactory for NoManifest {
        fn create(&self, _config: ClientCompilationConfig) -> Result<Arc<dyn Compiler>> {
            Ok(Arc::new(Idle(CompilerId::next())))
        }

        fn emits_manifest(&self) -> bool {
            false
        }
    }

    #[derive(Debug)]
    struct Idle(CompilerId);

    #[async_trait::async_trait]
    impl Compiler for Idle {
        fn id(&self) -> CompilerId {
            self.0
        }

        async fn compile(&self) -> Result<CompilationOutput> {
            Ok(CompilationOutput {
                manifest: Some(ChunkManifest::default()),
                ..Default::default()
            })
        }
    }

    #[test]
    fn session_refuses_factories_without_manifest() {
        let build =
            IsletBuild::new("/app", IsletConfig::default()).with_factory(Arc::new(NoManifest));
        assert!(matches!(
            WatchSession::new(build),
            Err(crate::Error::MissingManifestPlugin)
        ));
    }

    #[tokio::test]
    async fn rebuilds_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        let mut session =
            WatchSession::new(IsletBuild::new(dir.path(), IsletConfig::default())).unwrap();

        session.rebuild().await.unwrap();
        session.rebuild().await.unwrap();
        assert_eq!(session.generation(), 2);
        assert_eq!(session.active_compiler(), None);
    }
}
