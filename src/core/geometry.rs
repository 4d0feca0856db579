//! Geometry sources
//!
//! Two ways to learn where a note window is: the toolkit's own report, which
//! is zeroed under Wayland, and the shell extension's report for a claimed
//! handle. The resolver asks the shell first and falls back to the toolkit.

use async_trait::async_trait;
use std::sync::Arc;

use super::integration::ShellIntegration;
use crate::shared::types::{Geometry, GeometryOrigin, NoteId, WindowHandle};
use crate::system::window::WindowToolkit;

#[async_trait]
pub trait GeometrySource: Send + Sync {
    fn origin(&self) -> GeometryOrigin;

    /// `None` when this source has nothing for the window right now.
    async fn geometry(&self, note: &NoteId, handle: Option<WindowHandle>) -> Option<Geometry>;
}

pub struct ToolkitGeometry {
    toolkit: Arc<dyn WindowToolkit>,
}

impl ToolkitGeometry {
    pub fn new(toolkit: Arc<dyn WindowToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl GeometrySource for ToolkitGeometry {
    fn origin(&self) -> GeometryOrigin {
        GeometryOrigin::Toolkit
    }

    async fn geometry(&self, note: &NoteId, _handle: Option<WindowHandle>) -> Option<Geometry> {
        Some(Geometry {
            position: self.toolkit.position(note)?,
            size: self.toolkit.size(note)?,
        })
    }
}

pub struct ShellGeometry {
    integration: Arc<ShellIntegration>,
}

impl ShellGeometry {
    pub fn new(integration: Arc<ShellIntegration>) -> Self {
        Self { integration }
    }
}

#[async_trait]
impl GeometrySource for ShellGeometry {
    fn origin(&self) -> GeometryOrigin {
        GeometryOrigin::Shell
    }

    async fn geometry(&self, _note: &NoteId, handle: Option<WindowHandle>) -> Option<Geometry> {
        if !self.integration.is_available() {
            return None;
        }
        let details = self.integration.window_details(handle?).await?;
        Some(details.geometry())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedGeometry {
    pub geometry: Geometry,
    pub origin: GeometryOrigin,
}

/// Sources in priority order; the first one that answers wins.
pub struct GeometryResolver {
    sources: Vec<Box<dyn GeometrySource>>,
}

impl GeometryResolver {
    pub fn new(integration: Arc<ShellIntegration>, toolkit: Arc<dyn WindowToolkit>) -> Self {
        Self {
            sources: vec![
                Box::new(ShellGeometry::new(integration)),
                Box::new(ToolkitGeometry::new(toolkit)),
            ],
        }
    }

    pub async fn resolve(
        &self,
        note: &NoteId,
        handle: Option<WindowHandle>,
    ) -> Option<ResolvedGeometry> {
        for source in &self.sources {
            if let Some(geometry) = source.geometry(note, handle).await {
                return Some(ResolvedGeometry {
                    geometry,
                    origin: source.origin(),
                });
            }
        }
        None
    }
}
