use thiserror::Error;

/// Failures surfaced by the AR pipeline.
///
/// Startup failures (`InvalidIntrinsics`, shader errors, `GpuInit`) abort
/// initialisation. Everything else is per-frame or per-asset: the caller logs
/// it and keeps the render loop alive.
#[derive(Debug, Error)]
pub enum ArError {
    #[error("invalid camera intrinsics: fx={fx}, fy={fy}, viewport {width}x{height}")]
    InvalidIntrinsics {
        fx: f64,
        fy: f64,
        width: u32,
        height: u32,
    },

    #[error("invalid clip planes: near={near}, far={far}")]
    InvalidClipPlanes { near: f32, far: f32 },

    #[error("shader `{label}` failed to compile: {diagnostic}")]
    ShaderCompile { label: String, diagnostic: String },

    #[error("pipeline `{label}` failed to link: {diagnostic}")]
    ShaderLink { label: String, diagnostic: String },

    #[error("frame is {actual_width}x{actual_height}, background texture is {expected_width}x{expected_height}")]
    FrameSizeMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("frame is {width}x{height}, the GPU allows at most {max_dimension} pixels per side")]
    FrameTooLarge {
        width: u32,
        height: u32,
        max_dimension: u32,
    },

    #[error("malformed frame: expected {expected} bytes, got {actual}")]
    MalformedFrame { expected: usize, actual: usize },

    #[error("asset load failed: {0}")]
    AssetLoad(String),

    #[error("capture: {0}")]
    Capture(String),

    #[error("calibration: {0}")]
    Calibration(String),

    #[error("GPU initialisation failed: {0}")]
    GpuInit(String),

    #[error("surface error: {0}")]
    Surface(String),

    #[error("renderer is not initialised")]
    NotInitialized,
}

pub type Result<T> = std::result::Result<T, ArError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_diagnostics() {
        let err = ArError::ShaderCompile {
            label: "object".into(),
            diagnostic: "unknown identifier `nrm`".into(),
        };
        let text = err.to_string();
        assert!(text.contains("object"));
        assert!(text.contains("unknown identifier"));
    }

    #[test]
    fn frame_size_mismatch_reports_both_sizes() {
        let err = ArError::FrameSizeMismatch {
            expected_width: 640,
            expected_height: 480,
            actual_width: 1280,
            actual_height: 720,
        };
        assert_eq!(
            err.to_string(),
            "frame is 1280x720, background texture is 640x480"
        );
    }
}
