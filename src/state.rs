use crate::engine::Engine;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub type SharedState = Arc<AppState>;
