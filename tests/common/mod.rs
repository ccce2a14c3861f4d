//! Recording Backend
//!
//! A [`RenderBackend`] implementation that records every call instead of
//! talking to a GPU. The pipeline's orchestration — pool recycling, pass
//! bracketing, technique batching, blit ordering — is fully observable
//! through the recorded state, which is what the integration tests assert
//! against.

#![allow(dead_code)]

use slotmap::SlotMap;

use ember::errors::{EmberError, Result};
use ember::gfx::{
    BlitDestination, DrawCall, MeshData, MeshId, PassDescriptor, PixelRect, RenderBackend,
    SurfaceData, SurfaceDescriptor, SurfaceId, Technique, TechniqueParams,
};

/// Routes engine log output through the test harness; `RUST_LOG` selects
/// the level as usual. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One recorded blit.
#[derive(Clone, Copy, Debug)]
pub struct BlitRecord {
    pub src: SurfaceId,
    pub to_back_buffer: bool,
    pub viewport: Option<PixelRect>,
}

/// One recorded technique batch: the technique, how many draw calls it
/// carried (fullscreen batches carry zero) and the input surfaces it
/// sampled.
#[derive(Clone, Debug)]
pub struct DrawRecord {
    pub technique: Technique,
    pub call_count: usize,
    pub inputs: Vec<SurfaceId>,
}

#[derive(Default)]
pub struct RecordingBackend {
    surfaces: SlotMap<SurfaceId, SurfaceDescriptor>,
    meshes: SlotMap<MeshId, usize>,

    pub surfaces_created: u32,
    pub surfaces_destroyed: u32,
    pub passes_begun: u32,
    pub passes_ended: u32,
    pub frames_submitted: u32,
    pub draws: Vec<DrawRecord>,
    pub blits: Vec<BlitRecord>,

    /// Makes the next `create_surface` fail, for error-path tests.
    pub fail_surface_creation: bool,

    in_pass: bool,
}

impl RecordingBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches dispatched with `technique` so far.
    #[must_use]
    pub fn technique_batches(&self, technique: Technique) -> usize {
        self.draws
            .iter()
            .filter(|d| d.technique == technique)
            .count()
    }

    /// Total draw calls dispatched with `technique` so far.
    #[must_use]
    pub fn technique_calls(&self, technique: Technique) -> usize {
        self.draws
            .iter()
            .filter(|d| d.technique == technique)
            .map(|d| d.call_count)
            .sum()
    }

    /// Surfaces currently alive (created and not destroyed).
    #[must_use]
    pub fn live_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    #[must_use]
    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    fn violation(message: &str) -> EmberError {
        EmberError::PreconditionViolation {
            component: "RecordingBackend",
            message: message.to_string(),
        }
    }
}

impl RenderBackend for RecordingBackend {
    fn create_surface(&mut self, desc: &SurfaceDescriptor) -> Result<SurfaceId> {
        if self.fail_surface_creation {
            return Err(EmberError::SurfaceCreationFailed(
                "simulated allocation failure".to_string(),
            ));
        }
        self.surfaces_created += 1;
        Ok(self.surfaces.insert(*desc))
    }

    fn destroy_surface(&mut self, id: SurfaceId) {
        if self.surfaces.remove(id).is_some() {
            self.surfaces_destroyed += 1;
        }
    }

    fn surface_descriptor(&self, id: SurfaceId) -> Option<SurfaceDescriptor> {
        self.surfaces.get(id).copied()
    }

    fn upload_mesh(&mut self, data: &MeshData) -> Result<MeshId> {
        Ok(self.meshes.insert(data.vertices.len()))
    }

    fn destroy_mesh(&mut self, id: MeshId) {
        self.meshes.remove(id);
    }

    fn begin_pass(&mut self, desc: &PassDescriptor) -> Result<()> {
        if self.in_pass {
            return Err(Self::violation("begin_pass inside an open pass"));
        }
        for color in &desc.colors {
            if !self.surfaces.contains_key(color.surface) {
                return Err(EmberError::InvalidTarget("RecordingBackend::begin_pass"));
            }
        }
        self.in_pass = true;
        self.passes_begun += 1;
        Ok(())
    }

    fn draw(
        &mut self,
        technique: Technique,
        params: &TechniqueParams,
        calls: &[DrawCall],
    ) -> Result<()> {
        if !self.in_pass {
            return Err(Self::violation("draw outside of a pass"));
        }
        self.draws.push(DrawRecord {
            technique,
            call_count: calls.len(),
            inputs: params.inputs.to_vec(),
        });
        Ok(())
    }

    fn end_pass(&mut self) -> Result<()> {
        if !self.in_pass {
            return Err(Self::violation("end_pass without an open pass"));
        }
        self.in_pass = false;
        self.passes_ended += 1;
        Ok(())
    }

    fn blit(
        &mut self,
        src: SurfaceId,
        dst: BlitDestination,
        viewport: Option<PixelRect>,
    ) -> Result<()> {
        if self.in_pass {
            return Err(Self::violation("blit inside an open pass"));
        }
        if !self.surfaces.contains_key(src) {
            return Err(EmberError::InvalidTarget("RecordingBackend::blit"));
        }
        self.blits.push(BlitRecord {
            src,
            to_back_buffer: matches!(dst, BlitDestination::BackBuffer),
            viewport,
        });
        Ok(())
    }

    fn read_surface(&mut self, id: SurfaceId) -> Result<SurfaceData> {
        let desc = self
            .surfaces
            .get(id)
            .ok_or(EmberError::InvalidTarget("RecordingBackend::read_surface"))?;
        let byte_count = desc.size.pixel_count() as usize * 4;
        Ok(SurfaceData {
            size: desc.size,
            rgba: vec![0x40; byte_count],
        })
    }

    fn submit_frame(&mut self) -> Result<()> {
        if self.in_pass {
            return Err(Self::violation("submit_frame inside an open pass"));
        }
        self.frames_submitted += 1;
        Ok(())
    }
}
