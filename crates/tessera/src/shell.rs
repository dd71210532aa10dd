//! The shell context
//!
//! Bundles the render context with the two background workers and exposes
//! the operations scripts call. Everything here runs on the UI thread.

use std::path::PathBuf;

use tessera_render::{Color, OutputFormat, RenderContext, SurfaceId, TileId};
use tessera_resize::{ResizeOp, ResizeParams, ResizeStatus, ResizeWorker};
use tessera_system::BackgroundExec;

use crate::{Config, ShellError};

/// Render state plus the resize and command workers
pub struct Shell {
    config: Config,
    render: RenderContext,
    resize: ResizeWorker,
    exec: BackgroundExec,
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("render", &self.render)
            .field("resize", &self.resize)
            .field("exec", &self.exec)
            .finish()
    }
}

impl Shell {
    /// Create the render context and start both workers
    pub fn new(config: Config) -> Result<Self, ShellError> {
        let render = RenderContext::new(config.search_path(), config.pool_limits());
        let resize = ResizeWorker::start(config.resize_limits())?;
        let exec = BackgroundExec::start(config.debug_background_exec)?;

        tracing::info!("tessera {} ready", crate::VERSION);
        Ok(Self {
            config,
            render,
            resize,
            exec,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Direct access for surfaces and lower-level tile operations
    pub fn render(&self) -> &RenderContext {
        &self.render
    }

    pub fn render_mut(&mut self) -> &mut RenderContext {
        &mut self.render
    }

    pub fn resize_worker(&self) -> &ResizeWorker {
        &self.resize
    }

    // ========================================================================
    // Tiles
    // ========================================================================

    pub fn load_image(&mut self, path: &str) -> Option<TileId> {
        self.render.tile_load_image(path)
    }

    pub fn fill_color(&mut self, color: Color) -> TileId {
        self.render.tile_fill_color(color)
    }

    /// Grid order: center, top-left, top, top-right, right, bottom-right,
    /// bottom, bottom-left, left
    pub fn load_grid(&mut self, paths: [Option<&str>; 9]) -> Option<TileId> {
        self.render.tile_load_grid(paths)
    }

    /// Top, middle, bottom
    pub fn load_vertical(&mut self, paths: [Option<&str>; 3]) -> Option<TileId> {
        self.render.tile_load_vertical(paths)
    }

    /// Left, middle, right
    pub fn load_horizontal(&mut self, paths: [Option<&str>; 3]) -> Option<TileId> {
        self.render.tile_load_horizontal(paths)
    }

    pub fn tile_blit(&mut self, tile: TileId, dst: SurfaceId, x: i32, y: i32, w: u32, h: u32) {
        self.render.tile_blit(tile, dst, x, y, w, h);
    }

    pub fn tile_min_size(&mut self, tile: TileId) -> (u32, u32) {
        self.render.tile_min_size(tile)
    }

    /// Drop one reference to a tile or surface
    pub fn free(&mut self, id: TileId) {
        self.render.release(id);
    }

    // ========================================================================
    // Background work
    // ========================================================================

    /// Run a shell command in the background, output discarded
    pub fn exec(&self, cmd: impl Into<String>) {
        self.exec.submit(cmd);
    }

    /// Queue or poll a resize
    ///
    /// Returns `0` while pending, `1` once written and `-1` on failure or
    /// an unknown `op`. `image_type` `"bmp"` selects BMP output, anything
    /// else PNG.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_resize(
        &self,
        src: &str,
        dest: &str,
        width: u32,
        height: u32,
        sequence: u32,
        op: i32,
        image_type: &str,
    ) -> i32 {
        let Some(op) = ResizeOp::from_code(op) else {
            tracing::error!("unknown resize operation {} for {}", op, src);
            return ResizeStatus::Error.code();
        };

        let params = ResizeParams {
            src: PathBuf::from(src),
            dest: PathBuf::from(dest),
            width,
            height,
            sequence,
            op,
            format: OutputFormat::from_name(image_type),
        };
        self.resize.submit(params).code()
    }

    /// Stop both workers; pending resizes and commands are dropped
    pub fn shutdown(&mut self) {
        self.resize.shutdown();
        self.exec.shutdown();
    }
}
