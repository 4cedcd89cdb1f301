use glam::{Mat3, Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::calibration::CameraIntrinsics;
use crate::config::RenderConfig;
use crate::error::Result;
use crate::mesh::Material;
use crate::pose::Pose;
use crate::transform::{self, ClipPlanes, ModelAdjustment, Viewport};

/// Fixed Phong lighting, evaluated in the marker frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub shininess: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            position: [0.5, 0.5, -0.5],
            color: [1.0, 1.0, 1.0],
            ambient: 0.2,
            diffuse: 1.0,
            specular: 0.8,
            shininess: 32.0,
        }
    }
}

/// Object shader uniforms; matches `Uniforms` in object.wgsl
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniform {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    /// Inverse-transpose of the model's upper 3x3, padded to 4x4
    pub normal_matrix: [[f32; 4]; 4],
    pub light_position: [f32; 4],
    pub light_color: [f32; 4],
    pub view_position: [f32; 4],
    pub object_color: [f32; 4],
    /// ambient, diffuse, specular, shininess
    pub factors: [f32; 4],
}

/// Matrices for one object draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectDraw {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    /// Camera position in the marker frame, for specular highlights
    pub camera_position: Vec3,
}

impl ObjectDraw {
    /// Clip-space position of a model-space point
    pub fn clip_position(&self, point: Vec3) -> Vec4 {
        self.projection * self.view * self.model * point.extend(1.0)
    }

    /// Normalised device coordinates of a model-space point
    pub fn ndc(&self, point: Vec3) -> Vec3 {
        let clip = self.clip_position(point);
        clip.truncate() / clip.w
    }

    pub fn uniform(&self, material: &Material, lighting: &LightingConfig) -> ObjectUniform {
        let normal_matrix = Mat4::from_mat3(Mat3::from_mat4(self.model).inverse().transpose());
        let [r, g, b] = material.diffuse;

        ObjectUniform {
            model: self.model.to_cols_array_2d(),
            view: self.view.to_cols_array_2d(),
            projection: self.projection.to_cols_array_2d(),
            normal_matrix: normal_matrix.to_cols_array_2d(),
            light_position: Vec3::from(lighting.position).extend(1.0).to_array(),
            light_color: Vec3::from(lighting.color).extend(1.0).to_array(),
            view_position: self.camera_position.extend(1.0).to_array(),
            object_color: [r, g, b, 1.0],
            factors: [
                lighting.ambient,
                lighting.diffuse,
                lighting.specular,
                lighting.shininess,
            ],
        }
    }
}

/// What happens to the 3D object this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectDecision {
    /// No marker detected; background only
    NoMarker,
    /// Marker origin at or behind the camera plane
    BehindCamera,
    /// Marker visible but no mesh loaded
    NoAsset,
    Draw(ObjectDraw),
}

impl ObjectDecision {
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::Draw(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NoMarker => "no marker",
            Self::BehindCamera => "marker behind camera",
            Self::NoAsset => "no asset",
            Self::Draw(_) => "tracking",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ProjectionKey {
    viewport: Viewport,
    focal: [f64; 4],
}

/// Per-frame decisions of the renderer, free of GPU state.
///
/// Holds the projection for the current viewport and rebuilds it only when
/// the viewport (or the intrinsics) change.
#[derive(Debug, Clone)]
pub struct FramePlanner {
    clip: ClipPlanes,
    model: ModelAdjustment,
    lighting: LightingConfig,
    projection: Option<(ProjectionKey, Mat4)>,
    projection_updates: u64,
}

impl FramePlanner {
    pub fn new(clip: ClipPlanes, model: ModelAdjustment, lighting: LightingConfig) -> Self {
        Self {
            clip,
            model,
            lighting,
            projection: None,
            projection_updates: 0,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.clip, config.model, config.lighting)
    }

    pub fn lighting(&self) -> &LightingConfig {
        &self.lighting
    }

    /// How many times the projection was (re)built
    pub fn projection_updates(&self) -> u64 {
        self.projection_updates
    }

    pub fn projection(&mut self, intrinsics: &CameraIntrinsics, viewport: Viewport) -> Result<Mat4> {
        let key = ProjectionKey {
            viewport,
            focal: [intrinsics.fx(), intrinsics.fy(), intrinsics.cx(), intrinsics.cy()],
        };
        if let Some((cached, projection)) = self.projection {
            if cached == key {
                return Ok(projection);
            }
        }

        let projection = transform::projection_matrix(intrinsics, viewport, self.clip)?.as_mat4();
        log::debug!(
            "Projection rebuilt for {}x{} viewport",
            viewport.width,
            viewport.height
        );
        self.projection = Some((key, projection));
        self.projection_updates += 1;
        Ok(projection)
    }

    /// Decides whether and how the object is drawn for this frame
    pub fn plan(
        &mut self,
        pose: Option<&Pose>,
        intrinsics: &CameraIntrinsics,
        viewport: Viewport,
        has_mesh: bool,
        animation_offset: Vec3,
    ) -> Result<ObjectDecision> {
        let Some(pose) = pose else {
            return Ok(ObjectDecision::NoMarker);
        };
        if !pose.is_in_front() {
            return Ok(ObjectDecision::BehindCamera);
        }
        if !has_mesh {
            return Ok(ObjectDecision::NoAsset);
        }

        let projection = self.projection(intrinsics, viewport)?;
        Ok(ObjectDecision::Draw(ObjectDraw {
            model: self.model.model_matrix(animation_offset),
            view: transform::view_matrix(pose).as_mat4(),
            projection,
            camera_position: transform::camera_position(pose).as_vec3(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner() -> FramePlanner {
        FramePlanner::new(
            ClipPlanes::default(),
            ModelAdjustment::default(),
            LightingConfig::default(),
        )
    }

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics::pinhole(600.0, 600.0, 320.0, 240.0)
    }

    const VIEWPORT: Viewport = Viewport {
        width: 640,
        height: 480,
    };

    #[test]
    fn no_pose_means_no_marker() {
        let decision = planner()
            .plan(None, &intrinsics(), VIEWPORT, true, Vec3::ZERO)
            .unwrap();
        assert_eq!(decision, ObjectDecision::NoMarker);
    }

    #[test]
    fn pose_behind_camera_is_skipped() {
        let pose = Pose::from_arrays([0.0; 3], [0.0, 0.0, -0.5]);
        let decision = planner()
            .plan(Some(&pose), &intrinsics(), VIEWPORT, true, Vec3::ZERO)
            .unwrap();
        assert_eq!(decision, ObjectDecision::BehindCamera);

        let on_plane = Pose::from_arrays([0.0; 3], [0.1, 0.0, 0.0]);
        let decision = planner()
            .plan(Some(&on_plane), &intrinsics(), VIEWPORT, true, Vec3::ZERO)
            .unwrap();
        assert_eq!(decision, ObjectDecision::BehindCamera);
    }

    #[test]
    fn missing_mesh_is_reported() {
        let pose = Pose::from_arrays([0.0; 3], [0.0, 0.0, 0.5]);
        let decision = planner()
            .plan(Some(&pose), &intrinsics(), VIEWPORT, false, Vec3::ZERO)
            .unwrap();
        assert_eq!(decision, ObjectDecision::NoAsset);
    }

    #[test]
    fn projection_is_cached_per_viewport() {
        let mut planner = planner();
        let pose = Pose::from_arrays([0.0; 3], [0.0, 0.0, 0.5]);
        for _ in 0..5 {
            planner
                .plan(Some(&pose), &intrinsics(), VIEWPORT, true, Vec3::ZERO)
                .unwrap();
        }
        assert_eq!(planner.projection_updates(), 1);

        planner
            .plan(Some(&pose), &intrinsics(), Viewport::new(1280, 720), true, Vec3::ZERO)
            .unwrap();
        assert_eq!(planner.projection_updates(), 2);
    }

    #[test]
    fn animation_offset_moves_model() {
        let mut planner = planner();
        let pose = Pose::from_arrays([0.0; 3], [0.0, 0.0, 0.5]);
        let offset = Vec3::new(0.0, 0.025, 0.0);
        let ObjectDecision::Draw(draw) = planner
            .plan(Some(&pose), &intrinsics(), VIEWPORT, true, offset)
            .unwrap()
        else {
            panic!("expected a draw");
        };
        assert!(draw.model.w_axis.truncate().abs_diff_eq(offset, 1e-7));
    }

    #[test]
    fn uniform_carries_lighting_and_material() {
        let mut planner = planner();
        let pose = Pose::from_arrays([0.0; 3], [0.0, 0.0, 0.5]);
        let ObjectDecision::Draw(draw) = planner
            .plan(Some(&pose), &intrinsics(), VIEWPORT, true, Vec3::ZERO)
            .unwrap()
        else {
            panic!("expected a draw");
        };

        let material = Material {
            diffuse: [0.2, 0.6, 1.0],
        };
        let uniform = draw.uniform(&material, planner.lighting());
        assert_eq!(uniform.object_color, [0.2, 0.6, 1.0, 1.0]);
        assert_eq!(uniform.factors, [0.2, 1.0, 0.8, 32.0]);
        assert_eq!(uniform.light_position, [0.5, 0.5, -0.5, 1.0]);
        // Identity rotation: the camera sits 0.5 m along -Z of the marker
        assert!(Vec3::from_slice(&uniform.view_position[..3])
            .abs_diff_eq(Vec3::new(0.0, 0.0, -0.5), 1e-6));
    }

    #[test]
    fn uniform_layout_is_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<ObjectUniform>(), 336);
        assert_eq!(std::mem::size_of::<ObjectUniform>() % 16, 0);
    }
}
