use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use mandeltile_core::{ViewCommand, ViewState};

use crate::buffer::DisplaySurface;
use crate::color_table::ColorTable;
use crate::error::JobError;
use crate::job::{compute_tile, TileJob, TileResult};
use crate::pool::{JobHandle, WorkerPool};
use crate::tile::{partition, Tile};

/// Worker pool specialised for tile jobs.
pub type TilePool = WorkerPool<TileJob, TileResult>;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Canvas size and the tile grid laid over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub rows: u32,
    pub cols: u32,
}

/// Running counters, mostly for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub batches_started: u64,
    pub frames_committed: u64,
    pub batches_failed: u64,
    /// Batches that finished after a resize and were thrown away.
    pub batches_stale: u64,
    /// Submit-to-commit time of the last committed frame.
    pub last_frame: Option<Duration>,
}

/// One frame's worth of outstanding tile jobs.
struct Batch {
    view: ViewState,
    epoch: u64,
    /// Each outstanding handle with the tile it was submitted for.
    pending: Vec<(Tile, JobHandle<TileResult>)>,
    results: Vec<TileResult>,
    failure: Option<JobError>,
    started: Instant,
}

impl Batch {
    /// Move every settled handle's outcome into `results` / `failure`.
    ///
    /// A result that does not cover exactly the tile it was submitted for
    /// fails the batch like any other job error.
    fn collect(&mut self) {
        let Self {
            pending,
            results,
            failure,
            ..
        } = self;
        pending.retain_mut(|(tile, handle)| match handle.try_take() {
            Some(Ok(result)) => {
                match check_result(tile, &result) {
                    Ok(()) => results.push(result),
                    Err(e) => {
                        failure.get_or_insert(e);
                    }
                }
                false
            }
            Some(Err(e)) => {
                failure.get_or_insert(e);
                false
            }
            None => true,
        });
    }

    /// Give up on handles that can no longer settle.
    fn abandon(&mut self) {
        if !self.pending.is_empty() {
            self.failure.get_or_insert(JobError::Disconnected);
            self.pending.clear();
        }
    }
}

fn check_result(tile: &Tile, result: &TileResult) -> Result<(), JobError> {
    if result.tile != *tile {
        return Err(JobError::Failed(format!(
            "result for tile at ({}, {}) returned for tile at ({}, {})",
            result.tile.x, result.tile.y, tile.x, tile.y
        )));
    }
    if result.iterations.len() != tile.pixel_count() {
        return Err(JobError::Failed(format!(
            "tile at ({}, {}) returned {} counts, expected {}",
            tile.x,
            tile.y,
            result.iterations.len(),
            tile.pixel_count()
        )));
    }
    Ok(())
}

enum Phase {
    Idle,
    Rendering(Batch),
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Drives frame renders: fans tile jobs out to a [`TilePool`], waits for the
/// whole batch, colours it from frame-wide statistics, and composites the
/// result onto a [`DisplaySurface`].
///
/// At most one batch is ever in flight. A render requested while one is
/// running only marks a re-render as wanted; when the batch finishes, a
/// single new batch starts from whatever view is current at that moment.
///
/// The coordinator is single-threaded. Progress happens only inside
/// [`poll`](Self::poll) and [`wait_idle`](Self::wait_idle).
pub struct RenderCoordinator<S> {
    pool: TilePool,
    surface: S,
    layout: Layout,
    tiles: Vec<Tile>,
    /// Bumped on every resize so batches from an older layout are dropped.
    epoch: u64,
    view: ViewState,
    rendered: Option<ViewState>,
    phase: Phase,
    rerender_wanted: bool,
    color_table: Option<Arc<ColorTable>>,
    stats: RenderStats,
}

impl<S: DisplaySurface> RenderCoordinator<S> {
    /// Create an idle coordinator. Nothing is rendered until
    /// [`render`](Self::render) or a view change.
    pub fn new(
        mut surface: S,
        pool: TilePool,
        layout: Layout,
        view: ViewState,
    ) -> crate::Result<Self> {
        let tiles = partition(layout.width, layout.height, layout.rows, layout.cols)?;
        surface.resize(layout.width, layout.height);
        debug!(
            width = layout.width,
            height = layout.height,
            tiles = tiles.len(),
            workers = pool.size(),
            "Render coordinator ready"
        );
        Ok(Self {
            pool,
            surface,
            layout,
            tiles,
            epoch: 0,
            view,
            rendered: None,
            phase: Phase::Idle,
            rerender_wanted: false,
            color_table: None,
            stats: RenderStats::default(),
        })
    }

    /// Like [`new`](Self::new), with `workers` compute units running
    /// [`compute_tile`].
    pub fn with_workers(
        surface: S,
        workers: usize,
        layout: Layout,
        view: ViewState,
    ) -> crate::Result<Self> {
        let pool = WorkerPool::new(workers, compute_tile)?;
        Self::new(surface, pool, layout, view)
    }

    /// Start a frame for the current view, or note that another one is
    /// wanted if a frame is already in flight.
    pub fn render(&mut self) {
        if self.is_rendering() {
            if !self.rerender_wanted {
                debug!("Render requested while busy, coalescing");
            }
            self.rerender_wanted = true;
            return;
        }

        let view = self.view;
        let Layout { width, height, .. } = self.layout;
        let pending: Vec<_> = self
            .tiles
            .iter()
            .map(|&tile| (tile, self.pool.submit(TileJob::new(tile, &view, width, height))))
            .collect();

        self.stats.batches_started += 1;
        debug!(
            batch = self.stats.batches_started,
            tiles = pending.len(),
            cx = view.cx,
            cy = view.cy,
            per_pixel = view.per_pixel,
            max_iter = view.max_iterations,
            "Submitted tile batch"
        );

        self.phase = Phase::Rendering(Batch {
            view,
            epoch: self.epoch,
            results: Vec::with_capacity(pending.len()),
            pending,
            failure: None,
            started: Instant::now(),
        });
    }

    /// Replace the view and render it. Returns the new snapshot.
    pub fn set_view(&mut self, view: ViewState) -> ViewState {
        self.view = view;
        self.render();
        view
    }

    /// Apply a navigation command to the current view and render the result.
    pub fn apply(&mut self, command: ViewCommand) -> ViewState {
        let next = self.view.apply(command, self.layout.width, self.layout.height);
        self.set_view(next)
    }

    /// Re-partition for a new canvas size and render.
    ///
    /// A batch still in flight for the old size is discarded when it lands.
    pub fn resize(&mut self, width: u32, height: u32) -> crate::Result<()> {
        let layout = Layout {
            width,
            height,
            ..self.layout
        };
        self.tiles = partition(width, height, layout.rows, layout.cols)?;
        self.layout = layout;
        self.epoch += 1;
        self.surface.resize(width, height);
        debug!(width, height, tiles = self.tiles.len(), "Canvas resized");
        self.render();
        Ok(())
    }

    /// Make whatever progress is possible without blocking. Returns `true`
    /// while a frame is still in flight.
    pub fn poll(&mut self) -> bool {
        self.pool.try_pump();
        self.settle();
        self.is_rendering()
    }

    /// Block until no frame is in flight and no re-render is pending.
    pub fn wait_idle(&mut self) {
        loop {
            self.settle();
            let Phase::Rendering(batch) = &mut self.phase else {
                return;
            };
            if !self.pool.pump() {
                // Nothing left that could answer this batch's handles.
                batch.collect();
                batch.abandon();
            }
        }
    }

    fn settle(&mut self) {
        let finished = match &mut self.phase {
            Phase::Rendering(batch) => {
                batch.collect();
                batch.pending.is_empty()
            }
            Phase::Idle => false,
        };
        if finished {
            self.finish_batch();
        }
    }

    fn finish_batch(&mut self) {
        let Phase::Rendering(batch) = std::mem::replace(&mut self.phase, Phase::Idle) else {
            return;
        };

        if let Some(e) = batch.failure {
            self.stats.batches_failed += 1;
            warn!(error = %e, "Tile batch failed, frame dropped");
        } else if batch.epoch != self.epoch {
            self.stats.batches_stale += 1;
            debug!("Tile batch predates resize, frame dropped");
        } else {
            self.commit(batch.view, batch.results, batch.started);
        }

        if self.rerender_wanted {
            self.rerender_wanted = false;
            self.render();
        }
    }

    /// Colour a complete batch and hand it to the surface.
    fn commit(&mut self, view: ViewState, mut results: Vec<TileResult>, started: Instant) {
        let (min, max) = results
            .iter()
            .fold((view.max_iterations, 0), |(lo, hi), r| (lo.min(r.min), hi.max(r.max)));

        // One table for the whole frame, fixed before any buffer is touched.
        let table = self.color_table_for(min, max, view.max_iterations);
        results
            .par_iter_mut()
            .for_each(|r| table.recolor(&mut r.iterations));

        for r in &results {
            self.surface.put_tile(&r.tile, &r.iterations);
        }

        let elapsed = started.elapsed();
        self.rendered = Some(view);
        self.stats.frames_committed += 1;
        self.stats.last_frame = Some(elapsed);
        info!(
            elapsed_ms = elapsed.as_millis() as u64,
            tiles = results.len(),
            min,
            max,
            "Frame committed"
        );
    }

    fn color_table_for(&mut self, min: u32, max: u32, max_iterations: u32) -> Arc<ColorTable> {
        match &self.color_table {
            Some(table) if table.matches(min, max, max_iterations) => Arc::clone(table),
            _ => {
                let table = Arc::new(ColorTable::build(min, max, max_iterations));
                self.color_table = Some(Arc::clone(&table));
                table
            }
        }
    }

    /// The view that the next render will use.
    pub fn view(&self) -> ViewState {
        self.view
    }

    /// The view behind the frame currently on the surface, if any.
    pub fn rendered_view(&self) -> Option<ViewState> {
        self.rendered
    }

    pub fn is_rendering(&self) -> bool {
        matches!(self.phase, Phase::Rendering(_))
    }

    pub fn rerender_pending(&self) -> bool {
        self.rerender_wanted
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// The table used for the last committed frame.
    pub fn color_table(&self) -> Option<&Arc<ColorTable>> {
        self.color_table.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn pool(&self) -> &TilePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::buffer::RenderBuffer;
    use crate::color_table::INTERIOR;

    fn layout(width: u32, height: u32, rows: u32, cols: u32) -> Layout {
        Layout {
            width,
            height,
            rows,
            cols,
        }
    }

    fn view(max_iterations: u32) -> ViewState {
        ViewState::new(-0.5, 0.0, 3.0 / 32.0, max_iterations).unwrap()
    }

    fn spawn(workers: usize, layout: Layout, view: ViewState) -> RenderCoordinator<RenderBuffer> {
        RenderCoordinator::with_workers(RenderBuffer::new(1, 1), workers, layout, view).unwrap()
    }

    fn attach(pool: TilePool, layout: Layout, view: ViewState) -> RenderCoordinator<RenderBuffer> {
        RenderCoordinator::new(RenderBuffer::new(1, 1), pool, layout, view).unwrap()
    }

    /// A pool whose jobs record the iteration cap they were asked for.
    fn recording_pool(seen: Arc<Mutex<Vec<u32>>>) -> TilePool {
        WorkerPool::new(2, move |job: TileJob| -> Result<TileResult, String> {
            seen.lock().map_err(|e| e.to_string())?.push(job.max_iterations);
            compute_tile(job).map_err(|e| e.to_string())
        })
        .unwrap()
    }

    #[test]
    fn renders_a_frame() {
        let mut coord = spawn(2, layout(32, 32, 2, 2), view(50));
        assert!(!coord.is_rendering());
        coord.render();
        assert!(coord.is_rendering());
        coord.wait_idle();

        assert!(!coord.is_rendering());
        assert_eq!(coord.rendered_view(), Some(view(50)));
        assert_eq!(coord.stats().frames_committed, 1);
        assert_eq!(coord.surface().width, 32);
        // The centre of the initial view is inside the set.
        assert_eq!(coord.surface().pixel(16, 16), INTERIOR);
    }

    #[test]
    fn overlapping_requests_coalesce_to_latest_view() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut coord = RenderCoordinator::new(
            RenderBuffer::new(1, 1),
            recording_pool(Arc::clone(&seen)),
            layout(32, 32, 2, 2),
            view(10),
        )
        .unwrap();

        coord.render();
        coord.set_view(view(20));
        coord.set_view(view(30));
        assert_eq!(coord.stats().batches_started, 1, "no second concurrent batch");
        assert!(coord.rerender_pending());

        coord.wait_idle();

        let stats = coord.stats();
        assert_eq!(stats.batches_started, 2);
        assert_eq!(stats.frames_committed, 2);
        assert_eq!(coord.rendered_view(), Some(view(30)));

        let mut caps = seen.lock().unwrap().clone();
        caps.sort_unstable();
        caps.dedup();
        assert_eq!(caps, vec![10, 30], "the intermediate view is never rendered");
    }

    #[test]
    fn failed_batch_returns_to_idle_and_honours_rerender() {
        let pool = WorkerPool::new(2, |job: TileJob| -> Result<TileResult, String> {
            if job.max_iterations == 13 && job.tile.x == 0 && job.tile.y == 0 {
                return Err("bad tile".into());
            }
            compute_tile(job).map_err(|e| e.to_string())
        })
        .unwrap();
        let mut coord = attach(pool, layout(32, 32, 2, 2), view(13));

        coord.render();
        coord.set_view(view(20));
        coord.wait_idle();

        let stats = coord.stats();
        assert_eq!(stats.batches_failed, 1);
        assert_eq!(stats.frames_committed, 1);
        assert_eq!(coord.rendered_view(), Some(view(20)));
        assert!(!coord.is_rendering());
        assert_eq!(coord.pool().idle_count(), 2, "failure must not cost capacity");
    }

    #[test]
    fn failed_batch_alone_leaves_surface_untouched() {
        let pool = WorkerPool::new(1, |_: TileJob| -> Result<TileResult, String> {
            Err("always".into())
        })
        .unwrap();
        let mut coord = attach(pool, layout(8, 8, 2, 2), view(10));

        coord.render();
        coord.wait_idle();

        assert_eq!(coord.stats().batches_failed, 1);
        assert_eq!(coord.rendered_view(), None);
        assert!(coord.surface().pixels.iter().all(|&b| b == 0));
    }

    #[test]
    fn wrong_sized_result_fails_batch() {
        let pool = WorkerPool::new(2, |job: TileJob| -> Result<TileResult, String> {
            let counts = vec![1; job.tile.pixel_count() * 2];
            Ok(TileResult::from_counts(job.tile, counts, job.max_iterations))
        })
        .unwrap();
        let mut coord = attach(pool, layout(4, 4, 2, 2), view(10));

        coord.render();
        coord.wait_idle();

        assert_eq!(coord.stats().batches_failed, 1);
        assert_eq!(coord.stats().frames_committed, 0);
        assert!(!coord.is_rendering());
        assert!(coord.surface().pixels.iter().all(|&b| b == 0));
    }

    #[test]
    fn result_for_another_tile_fails_batch() {
        let pool = WorkerPool::new(1, |job: TileJob| -> Result<TileResult, String> {
            let tile = Tile { x: 0, y: 0, ..job.tile };
            let counts = vec![1; tile.pixel_count()];
            Ok(TileResult::from_counts(tile, counts, job.max_iterations))
        })
        .unwrap();
        let mut coord = attach(pool, layout(4, 4, 2, 2), view(10));

        coord.render();
        coord.set_view(view(12));
        coord.wait_idle();

        let stats = coord.stats();
        assert_eq!(stats.batches_failed, 2);
        assert_eq!(stats.batches_started, 2, "rerender still honoured");
        assert_eq!(coord.rendered_view(), None);
        assert_eq!(coord.pool().idle_count(), 1);
    }

    #[test]
    fn uniform_interior_frame_is_all_sentinel() {
        let pool = WorkerPool::new(2, |job: TileJob| -> Result<TileResult, String> {
            let counts = vec![job.max_iterations; job.tile.pixel_count()];
            Ok(TileResult::from_counts(job.tile, counts, job.max_iterations))
        })
        .unwrap();
        let mut coord = attach(pool, layout(6, 4, 2, 3), view(40));

        coord.render();
        coord.wait_idle();

        let table = coord.color_table().unwrap();
        assert_eq!(table.get(40), INTERIOR);
        for y in 0..4 {
            for x in 0..6 {
                assert_eq!(coord.surface().pixel(x, y), INTERIOR);
            }
        }
    }

    #[test]
    fn color_table_reused_until_statistics_change() {
        let mut coord = spawn(2, layout(32, 32, 2, 2), view(50));
        coord.render();
        coord.wait_idle();
        let first = Arc::clone(coord.color_table().unwrap());

        coord.render();
        coord.wait_idle();
        assert!(Arc::ptr_eq(&first, coord.color_table().unwrap()));

        coord.apply(ViewCommand::MoreIterations);
        coord.wait_idle();
        let rebuilt = coord.color_table().unwrap();
        assert!(!Arc::ptr_eq(&first, rebuilt));
        assert_eq!(rebuilt.len(), 76);
    }

    #[test]
    fn resize_drops_stale_batch() {
        let mut coord = spawn(2, layout(8, 8, 2, 2), view(20));
        coord.render();
        coord.resize(12, 10).unwrap();
        coord.wait_idle();

        let stats = coord.stats();
        assert_eq!(stats.batches_started, 2);
        assert_eq!(stats.batches_stale, 1);
        assert_eq!(stats.frames_committed, 1);
        assert_eq!((coord.surface().width, coord.surface().height), (12, 10));
        assert_eq!(coord.tiles().len(), 4);
    }

    #[test]
    fn poll_makes_progress_without_blocking() {
        let mut coord = spawn(2, layout(16, 16, 2, 2), view(20));
        coord.render();
        while coord.poll() {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(coord.stats().frames_committed, 1);
    }

    #[test]
    fn apply_returns_snapshot_not_reference() {
        let mut coord = spawn(1, layout(16, 16, 1, 1), view(20));
        let before = coord.view();
        let after = coord.apply(ViewCommand::ZoomOut);
        assert_eq!(before, view(20));
        assert_eq!(after, coord.view());
        assert!((after.per_pixel - before.per_pixel * 2.0).abs() < 1e-15);
        coord.wait_idle();
    }
}
