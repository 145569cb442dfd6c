use crate::bootstrap::{bootstrap, SceneRecipe};
use crate::error::BootstrapError;
use crate::host::HostContext;
use crate::session::{SceneSession, SessionHandle};
use futures::future::{FutureExt, LocalBoxFuture};
use std::rc::Rc;

pub const INTRO_SCENE: &str = "intro";
pub const MIXED_REALITY_SCENE: &str = "mixed-reality";

/// Builds a fully bootstrapped session. The lifecycle controller calls this only after the
/// previous session is completely torn down.
pub trait SceneFactory {
    fn name(&self) -> &str;

    fn build<'a>(&'a self, ctx: &'a Rc<HostContext>) -> LocalBoxFuture<'a, Result<SessionHandle, BootstrapError>>;
}

async fn build_from_recipe(
    name: &str,
    ctx: &Rc<HostContext>,
    recipe: &SceneRecipe,
) -> Result<SessionHandle, BootstrapError> {
    let session = SessionHandle::new(SceneSession::new(ctx.next_session_id(), name, ctx.config(), ctx.viewport()));
    bootstrap(&session, ctx, recipe).await?;
    Ok(session)
}

/// Landing scene with a start affordance that hands over to the mixed-reality scene.
#[derive(Debug, Clone)]
pub struct IntroScene {
    next: String,
}

impl Default for IntroScene {
    fn default() -> Self {
        Self { next: MIXED_REALITY_SCENE.to_string() }
    }
}

impl IntroScene {
    pub fn leading_to(next: impl Into<String>) -> Self {
        Self { next: next.into() }
    }
}

impl SceneFactory for IntroScene {
    fn name(&self) -> &str {
        INTRO_SCENE
    }

    fn build<'a>(&'a self, ctx: &'a Rc<HostContext>) -> LocalBoxFuture<'a, Result<SessionHandle, BootstrapError>> {
        async move { build_from_recipe(INTRO_SCENE, ctx, &SceneRecipe::intro(self.next.clone())).await }.boxed_local()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MixedRealityScene;

impl SceneFactory for MixedRealityScene {
    fn name(&self) -> &str {
        MIXED_REALITY_SCENE
    }

    fn build<'a>(&'a self, ctx: &'a Rc<HostContext>) -> LocalBoxFuture<'a, Result<SessionHandle, BootstrapError>> {
        async move { build_from_recipe(MIXED_REALITY_SCENE, ctx, &SceneRecipe::mixed_reality()).await }
            .boxed_local()
    }
}

/// Scene factories addressable by name.
#[derive(Clone, Default)]
pub struct SceneCatalog {
    factories: Vec<Rc<dyn SceneFactory>>,
}

impl SceneCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        catalog.register(Rc::new(IntroScene::default()));
        catalog.register(Rc::new(MixedRealityScene));
        catalog
    }

    /// Adds a factory, replacing any existing one with the same name.
    pub fn register(&mut self, factory: Rc<dyn SceneFactory>) {
        self.factories.retain(|existing| existing.name() != factory.name());
        self.factories.push(factory);
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn SceneFactory>> {
        self.factories.iter().find(|factory| factory.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.iter().map(|factory| factory.name()).collect()
    }
}
