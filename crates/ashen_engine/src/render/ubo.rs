//! CPU-side mirrors of the shader uniform blocks
//!
//! Every struct here is laid out by hand to match std140: vec3 data is
//! carried in vec4 slots with the spare lane holding a scalar where the
//! shader expects one. Sizes are pinned by compile-time assertions against
//! the rules in [`crate::render::std140`].

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{Mat4, Vec3};
use crate::render::std140;
use crate::scene::{DirectionalLight, PointLight, Scene, SpotLight, MAX_LIGHTS_PER_KIND};

fn vec4(v: &Vec3, w: f32) -> [f32; 4] {
    [v.x, v.y, v.z, w]
}

fn mat4(m: &Mat4) -> [[f32; 4]; 4] {
    (*m).into()
}

/// Per-frame camera matrices, bound at set 0 binding 0
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUbo {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
}

impl CameraUbo {
    pub fn new(projection: &Mat4, view: &Mat4) -> Self {
        Self {
            projection: mat4(projection),
            view: mat4(view),
        }
    }
}

/// Directional light as the shader block sees it
///
/// Direction carries intensity in its w lane.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct DirectionalLightGpu {
    pub direction: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
}

impl From<&DirectionalLight> for DirectionalLightGpu {
    fn from(light: &DirectionalLight) -> Self {
        Self {
            direction: vec4(&light.direction, light.intensity),
            ambient: vec4(&light.color.ambient, 0.0),
            diffuse: vec4(&light.color.diffuse, 0.0),
            specular: vec4(&light.color.specular, 0.0),
        }
    }
}

/// Point light as the shader block sees it
///
/// Position carries intensity in its w lane; attenuation packs the constant,
/// linear and exponential terms.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct PointLightGpu {
    pub position: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub attenuation: [f32; 4],
}

impl From<&PointLight> for PointLightGpu {
    fn from(light: &PointLight) -> Self {
        Self {
            position: vec4(&light.position, light.intensity),
            ambient: vec4(&light.color.ambient, 0.0),
            diffuse: vec4(&light.color.diffuse, 0.0),
            specular: vec4(&light.color.specular, 0.0),
            attenuation: [
                light.attenuation.constant,
                light.attenuation.linear,
                light.attenuation.exponential,
                0.0,
            ],
        }
    }
}

/// Spot light as the shader block sees it
///
/// Direction carries the cosine of the cone cutoff in its w lane.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct SpotLightGpu {
    pub position: [f32; 4],
    pub direction: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub attenuation: [f32; 4],
}

impl From<&SpotLight> for SpotLightGpu {
    fn from(light: &SpotLight) -> Self {
        Self {
            position: vec4(&light.position, light.intensity),
            direction: vec4(&light.direction, light.cutoff.cos()),
            ambient: vec4(&light.color.ambient, 0.0),
            diffuse: vec4(&light.color.diffuse, 0.0),
            specular: vec4(&light.color.specular, 0.0),
            attenuation: [
                light.attenuation.constant,
                light.attenuation.linear,
                light.attenuation.exponential,
                0.0,
            ],
        }
    }
}

/// Per-frame lighting block, bound at set 0 binding 1
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SceneLightsUbo {
    pub inverse_view: [[f32; 4]; 4],
    pub directional: [DirectionalLightGpu; MAX_LIGHTS_PER_KIND],
    pub point: [PointLightGpu; MAX_LIGHTS_PER_KIND],
    pub spot: [SpotLightGpu; MAX_LIGHTS_PER_KIND],
    /// x = directional count, y = point count, z = spot count
    pub counts: [u32; 4],
}

impl SceneLightsUbo {
    /// Pack the scene's lights and the camera's inverse view matrix
    ///
    /// The scene caps each category at [`MAX_LIGHTS_PER_KIND`] on insertion,
    /// so the counts always fit the fixed arrays.
    pub fn from_scene(scene: &Scene) -> Self {
        let mut ubo = Self {
            inverse_view: mat4(scene.camera.inverse_view()),
            directional: Default::default(),
            point: Default::default(),
            spot: Default::default(),
            counts: [0; 4],
        };
        for (slot, light) in ubo
            .directional
            .iter_mut()
            .zip(scene.directional_lights())
        {
            *slot = light.into();
        }
        for (slot, light) in ubo.point.iter_mut().zip(scene.point_lights()) {
            *slot = light.into();
        }
        for (slot, light) in ubo.spot.iter_mut().zip(scene.spot_lights()) {
            *slot = light.into();
        }
        ubo.counts = [
            scene.directional_lights().len() as u32,
            scene.point_lights().len() as u32,
            scene.spot_lights().len() as u32,
            0,
        ];
        ubo
    }
}

/// Per-instance transform streamed as vertex attributes at binding 1
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub translation: [f32; 4],
    pub scale: [f32; 4],
    pub rotation: [f32; 4],
}

impl InstanceData {
    /// Per-instance input binding at slot 1
    pub fn binding_description() -> ash::vk::VertexInputBindingDescription {
        ash::vk::VertexInputBindingDescription {
            binding: 1,
            stride: std::mem::size_of::<InstanceData>() as u32,
            input_rate: ash::vk::VertexInputRate::INSTANCE,
        }
    }

    /// Attribute locations 3..=5: translation, scale, rotation
    pub fn attribute_descriptions() -> Vec<ash::vk::VertexInputAttributeDescription> {
        (0..3u32)
            .map(|i| ash::vk::VertexInputAttributeDescription {
                location: 3 + i,
                binding: 1,
                format: ash::vk::Format::R32G32B32A32_SFLOAT,
                offset: i * std::mem::size_of::<[f32; 4]>() as u32,
            })
            .collect()
    }
}

// std140 layout pins. A failure here means a struct above no longer matches
// the shader blocks.
const _: () = {
    use std::mem::size_of;

    assert!(size_of::<CameraUbo>() == 128);
    assert!(size_of::<DirectionalLightGpu>() == 64);
    assert!(size_of::<PointLightGpu>() == 80);
    assert!(size_of::<SpotLightGpu>() == 96);
    assert!(
        size_of::<SceneLightsUbo>()
            == 64 + (64 + 80 + 96) * MAX_LIGHTS_PER_KIND + 16
    );

    // Each light struct must land on a std140 array stride boundary.
    assert!(size_of::<DirectionalLightGpu>() % std140::array_alignment(16) == 0);
    assert!(size_of::<PointLightGpu>() % std140::array_alignment(16) == 0);
    assert!(size_of::<SpotLightGpu>() % std140::array_alignment(16) == 0);
    assert!(size_of::<InstanceData>() % std140::vector_alignment(4, 4) == 0);
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    #[test]
    fn directional_light_packs_intensity_into_w() {
        let mut light = DirectionalLight::new(Vec3::new(0.0, -1.0, 0.0));
        light.intensity = 2.5;
        let gpu = DirectionalLightGpu::from(&light);
        assert_eq!(gpu.direction, [0.0, -1.0, 0.0, 2.5]);
    }

    #[test]
    fn spot_light_packs_cutoff_cosine() {
        let light = SpotLight::new(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.0, 0.0, -1.0),
            std::f32::consts::FRAC_PI_4,
        );
        let gpu = SpotLightGpu::from(&light);
        assert!((gpu.direction[3] - std::f32::consts::FRAC_PI_4.cos()).abs() < 1e-6);
        assert_eq!(gpu.position, [1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn scene_lights_ubo_reports_counts() {
        let mut scene = Scene::new();
        scene.add_directional_light("Sun", DirectionalLight::new(Vec3::new(0.0, -1.0, 0.0)));
        scene.add_point_light("Lamp", PointLight::new(Vec3::new(0.0, 2.0, 0.0)));
        scene.add_point_light("Lamp", PointLight::new(Vec3::new(4.0, 2.0, 0.0)));

        let ubo = SceneLightsUbo::from_scene(&scene);
        assert_eq!(ubo.counts, [1, 2, 0, 0]);
        assert_eq!(ubo.point[1].position[0], 4.0);
    }

    #[test]
    fn scene_lights_ubo_is_bounded_at_capacity() {
        let mut scene = Scene::new();
        for i in 0..MAX_LIGHTS_PER_KIND + 3 {
            scene.add_point_light(
                &format!("Lamp {i}"),
                PointLight::new(Vec3::new(i as f32, 0.0, 0.0)),
            );
        }
        let ubo = SceneLightsUbo::from_scene(&scene);
        assert_eq!(ubo.counts[1] as usize, MAX_LIGHTS_PER_KIND);
    }
}
