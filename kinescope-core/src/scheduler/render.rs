//! Render cycle
//!
//! Lock order is always render lock, then frame lock. The frame lock is
//! only held to copy a finished frame out and to release it afterwards;
//! decoding and flushing run under the render lock alone, so ingestion of
//! the next frame continues while the panel is being drawn.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Instant};

use super::lock::lock_within;
use super::LockBounds;
use crate::config::StreamConfig;
use crate::pacing::{AdaptivePacer, PacingSample};
use crate::reassembly::{FrameReassembler, ReassemblyError};
use crate::render::{RenderError, RenderPipeline, RenderStats};
use crate::telemetry::Telemetry;
use crate::traits::{MemoryProbe, PixelDisplay, TileDecoder};

/// What the render step of a cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RenderOutcome {
    /// Pacing interval has not elapsed
    NotDue,
    /// No finished frame waiting
    Idle,
    /// A lock could not be taken in time
    Contended,
    /// Finished frame failed validation and was dropped
    Rejected(ReassemblyError),
    /// Frame decoded but could not be drawn
    Failed {
        frame_id: u32,
        error: RenderError,
    },
    /// Frame reached the panel
    Rendered {
        frame_id: u32,
        stats: RenderStats,
        /// Decode and flush time
        render_time: Duration,
        pacing: Option<PacingSample>,
    },
}

/// What one render cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RenderReport {
    pub outcome: RenderOutcome,
    /// Free heap was below the floor
    pub memory_low: bool,
}

/// Render loop body
pub struct RenderCycle {
    pacer: AdaptivePacer,
    bounds: LockBounds,
    min_free_heap: usize,
    pending_release: Option<u32>,
}

impl RenderCycle {
    pub fn new(config: &StreamConfig) -> Self {
        Self::with_bounds(config, LockBounds::DEFAULT)
    }

    pub fn with_bounds(config: &StreamConfig, bounds: LockBounds) -> Self {
        Self {
            pacer: AdaptivePacer::new(config),
            bounds,
            min_free_heap: config.min_free_heap,
            pending_release: None,
        }
    }

    pub fn pacer(&self) -> &AdaptivePacer {
        &self.pacer
    }

    /// Frame whose release is waiting for the frame lock
    pub fn pending_release(&self) -> Option<u32> {
        self.pending_release
    }

    /// Run one cycle at time `now`
    pub async fn run_once<M, D, X, P>(
        &mut self,
        frame: &Mutex<M, FrameReassembler<'_>>,
        render: &Mutex<M, RenderPipeline<D, X>>,
        telemetry: &Telemetry,
        heap: &P,
        now: Instant,
    ) -> RenderReport
    where
        M: RawMutex,
        D: PixelDisplay,
        X: TileDecoder,
        P: MemoryProbe,
    {
        self.retry_release(frame).await;

        let outcome = if self.pending_release.is_some() {
            RenderOutcome::Contended
        } else {
            self.render_frame(frame, render, telemetry, now).await
        };

        let memory_low = telemetry.check_memory(heap, self.min_free_heap);
        RenderReport { outcome, memory_low }
    }

    async fn retry_release<M: RawMutex>(&mut self, frame: &Mutex<M, FrameReassembler<'_>>) {
        let Some(frame_id) = self.pending_release else {
            return;
        };
        if let Ok(mut reassembler) = lock_within(frame, self.bounds.frame).await {
            reassembler.release_rendered(frame_id);
            self.pending_release = None;
        }
    }

    async fn render_frame<M, D, X>(
        &mut self,
        frame: &Mutex<M, FrameReassembler<'_>>,
        render: &Mutex<M, RenderPipeline<D, X>>,
        telemetry: &Telemetry,
        now: Instant,
    ) -> RenderOutcome
    where
        M: RawMutex,
        D: PixelDisplay,
        X: TileDecoder,
    {
        if !self.pacer.is_due(now) {
            return RenderOutcome::NotDue;
        }

        let Ok(mut pipeline) = lock_within(render, self.bounds.render).await else {
            return RenderOutcome::Contended;
        };

        let assembled = {
            let Ok(mut reassembler) = lock_within(frame, self.bounds.frame).await else {
                return RenderOutcome::Contended;
            };
            if !reassembler.ready_for_render() {
                return RenderOutcome::Idle;
            }
            match reassembler.assemble_complete_frame(pipeline.frame_buffer_mut()) {
                Ok(assembled) => assembled,
                Err(err) => {
                    reassembler.reset_current_frame();
                    return RenderOutcome::Rejected(err);
                }
            }
        };

        let started = Instant::now();
        let result = pipeline.render(assembled.len).await;
        let render_time = started.elapsed();

        let outcome = match result {
            Ok(stats) => {
                let pacing = self.pacer.record_render(now);
                telemetry.frame_rendered();
                telemetry.set_render_time(render_time);
                RenderOutcome::Rendered {
                    frame_id: assembled.frame_id,
                    stats,
                    render_time,
                    pacing,
                }
            }
            Err(error) => RenderOutcome::Failed {
                frame_id: assembled.frame_id,
                error,
            },
        };

        // Released whether or not the render succeeded
        match lock_within(frame, self.bounds.frame).await {
            Ok(mut reassembler) => {
                reassembler.release_rendered(assembled.frame_id);
            }
            Err(_) => self.pending_release = Some(assembled.frame_id),
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{tile, FakeDecoder, FakeDisplay, FixedHeap};
    use alloc::vec;
    use alloc::vec::Vec;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use kinescope_protocol::{FragmentHeader, HEADER_LEN};

    type Frame<'t> = Mutex<NoopRawMutex, FrameReassembler<'t>>;
    type Render = Mutex<NoopRawMutex, RenderPipeline<FakeDisplay, FakeDecoder>>;

    fn config() -> StreamConfig {
        StreamConfig {
            display_width: 4,
            display_height: 4,
            max_frame_size: 128,
            max_packets: 8,
            pixel_buffer_headroom: 0,
            ..StreamConfig::DEFAULT
        }
    }

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn jpeg(len: usize, valid: bool) -> Vec<u8> {
        let mut image = vec![0x42u8; len];
        image[..2].copy_from_slice(&[0xFF, 0xD8]);
        if valid {
            image[len - 2..].copy_from_slice(&[0xFF, 0xD9]);
        }
        image
    }

    fn datagram(frame_id: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; HEADER_LEN];
        FragmentHeader::new(frame_id, 1, 0, payload.len() as u32)
            .encode(&mut out)
            .unwrap();
        out.extend_from_slice(payload);
        out
    }

    fn render_mutex(decoder: FakeDecoder) -> Render {
        let display = FakeDisplay::new(4, 4);
        let pipeline = RenderPipeline::new(&config(), display, decoder, &FixedHeap(1_000)).unwrap();
        Mutex::new(pipeline)
    }

    fn deliver(frame: &Frame<'_>, frame_id: u32, valid: bool) {
        let packet = datagram(frame_id, &jpeg(40, valid));
        block_on(frame.lock())
            .process_packet(&packet, Instant::from_millis(0))
            .unwrap();
    }

    #[test]
    fn test_renders_completed_frame() {
        let telemetry = Telemetry::new();
        let frame: Frame = Mutex::new(FrameReassembler::new(&config(), &telemetry).unwrap());
        let render = render_mutex(FakeDecoder::new(vec![tile(0, 0, 1, 1, &[9])]));
        let mut cycle = RenderCycle::with_bounds(&config(), LockBounds::IMMEDIATE);
        let heap = FixedHeap(50_000);

        deliver(&frame, 3, true);
        let report = block_on(cycle.run_once(&frame, &render, &telemetry, &heap, at(0)));

        let RenderOutcome::Rendered {
            frame_id: 3,
            render_time,
            ..
        } = report.outcome
        else {
            panic!("unexpected outcome {:?}", report.outcome);
        };
        assert_eq!(telemetry.last_render_us() as u64, render_time.as_micros());
        assert!(!report.memory_low);
        assert_eq!(telemetry.frames_completed(), 1);
        assert_eq!(telemetry.frames_rendered(), 1);
        assert_eq!(block_on(render.lock()).display().pushed()[0], 9);

        let descriptor = *block_on(frame.lock()).descriptor();
        assert!(!descriptor.is_complete);
        assert!(!descriptor.is_valid);
        assert!(!descriptor.is_rendering);
    }

    #[test]
    fn test_idle_without_frame() {
        let telemetry = Telemetry::new();
        let frame: Frame = Mutex::new(FrameReassembler::new(&config(), &telemetry).unwrap());
        let render = render_mutex(FakeDecoder::new(vec![]));
        let mut cycle = RenderCycle::with_bounds(&config(), LockBounds::IMMEDIATE);
        let heap = FixedHeap(50_000);

        let report = block_on(cycle.run_once(&frame, &render, &telemetry, &heap, at(0)));
        assert_eq!(report.outcome, RenderOutcome::Idle);
        assert!(block_on(render.lock()).display().ops.is_empty());
    }

    #[test]
    fn test_pacing_gates_next_render() {
        let telemetry = Telemetry::new();
        let frame: Frame = Mutex::new(FrameReassembler::new(&config(), &telemetry).unwrap());
        let render = render_mutex(FakeDecoder::new(vec![]));
        let mut cycle = RenderCycle::with_bounds(&config(), LockBounds::IMMEDIATE);
        let heap = FixedHeap(50_000);

        deliver(&frame, 1, true);
        block_on(cycle.run_once(&frame, &render, &telemetry, &heap, at(100)));

        deliver(&frame, 2, true);
        let early = block_on(cycle.run_once(&frame, &render, &telemetry, &heap, at(108)));
        assert_eq!(early.outcome, RenderOutcome::NotDue);
        assert!(block_on(frame.lock()).ready_for_render());

        let due = block_on(cycle.run_once(&frame, &render, &telemetry, &heap, at(116)));
        assert!(matches!(due.outcome, RenderOutcome::Rendered { frame_id: 2, .. }));
        assert_eq!(telemetry.frames_rendered(), 2);
    }

    #[test]
    fn test_corrupt_frame_rejected_and_cleared() {
        let telemetry = Telemetry::new();
        let frame: Frame = Mutex::new(FrameReassembler::new(&config(), &telemetry).unwrap());
        let render = render_mutex(FakeDecoder::new(vec![]));
        let mut cycle = RenderCycle::with_bounds(&config(), LockBounds::IMMEDIATE);
        let heap = FixedHeap(50_000);

        deliver(&frame, 1, false);
        let report = block_on(cycle.run_once(&frame, &render, &telemetry, &heap, at(0)));

        assert_eq!(report.outcome, RenderOutcome::Rejected(ReassemblyError::InvalidJpeg));
        assert_eq!(telemetry.frames_corrupt(), 1);
        assert!(!block_on(frame.lock()).descriptor().is_complete);
        assert!(cycle.pacer().is_due(Instant::from_millis(0)));
    }

    #[test]
    fn test_failed_render_still_releases() {
        let telemetry = Telemetry::new();
        let frame: Frame = Mutex::new(FrameReassembler::new(&config(), &telemetry).unwrap());
        let mut decoder = FakeDecoder::new(vec![]);
        decoder.fail_at = Some(0);
        let render = render_mutex(decoder);
        let mut cycle = RenderCycle::with_bounds(&config(), LockBounds::IMMEDIATE);
        let heap = FixedHeap(50_000);

        deliver(&frame, 6, true);
        let report = block_on(cycle.run_once(&frame, &render, &telemetry, &heap, at(0)));

        assert!(matches!(report.outcome, RenderOutcome::Failed { frame_id: 6, .. }));
        assert_eq!(telemetry.frames_rendered(), 0);
        let descriptor = *block_on(frame.lock()).descriptor();
        assert!(!descriptor.is_complete);
        assert!(!descriptor.is_rendering);
    }

    #[test]
    fn test_contended_render_lock_skips() {
        let telemetry = Telemetry::new();
        let frame: Frame = Mutex::new(FrameReassembler::new(&config(), &telemetry).unwrap());
        let render = render_mutex(FakeDecoder::new(vec![]));
        let mut cycle = RenderCycle::with_bounds(&config(), LockBounds::IMMEDIATE);
        let heap = FixedHeap(50_000);

        deliver(&frame, 1, true);
        let held = render.try_lock().unwrap();
        let report = block_on(cycle.run_once(&frame, &render, &telemetry, &heap, at(0)));
        drop(held);

        assert_eq!(report.outcome, RenderOutcome::Contended);
        assert!(block_on(frame.lock()).ready_for_render());
    }

    #[test]
    fn test_pending_release_retried_first() {
        let telemetry = Telemetry::new();
        let frame: Frame = Mutex::new(FrameReassembler::new(&config(), &telemetry).unwrap());
        let render = render_mutex(FakeDecoder::new(vec![]));
        let mut cycle = RenderCycle::with_bounds(&config(), LockBounds::IMMEDIATE);
        let heap = FixedHeap(50_000);

        // Frame 4 was handed out but its release could not take the lock
        deliver(&frame, 4, true);
        let mut out = [0u8; 128];
        block_on(frame.lock()).assemble_complete_frame(&mut out).unwrap();
        cycle.pending_release = Some(4);

        let held = frame.try_lock().unwrap();
        let report = block_on(cycle.run_once(&frame, &render, &telemetry, &heap, at(0)));
        drop(held);
        assert_eq!(report.outcome, RenderOutcome::Contended);
        assert_eq!(cycle.pending_release(), Some(4));

        let report = block_on(cycle.run_once(&frame, &render, &telemetry, &heap, at(1)));
        assert_eq!(report.outcome, RenderOutcome::Idle);
        assert_eq!(cycle.pending_release(), None);
        assert!(!block_on(frame.lock()).descriptor().is_rendering);
    }

    #[test]
    fn test_low_memory_counted() {
        let telemetry = Telemetry::new();
        let frame: Frame = Mutex::new(FrameReassembler::new(&config(), &telemetry).unwrap());
        let render = render_mutex(FakeDecoder::new(vec![]));
        let mut cycle = RenderCycle::with_bounds(&config(), LockBounds::IMMEDIATE);
        let heap = FixedHeap(1_000);

        let report = block_on(cycle.run_once(&frame, &render, &telemetry, &heap, at(0)));
        assert!(report.memory_low);
        assert_eq!(telemetry.memory_errors(), 1);
    }
}
