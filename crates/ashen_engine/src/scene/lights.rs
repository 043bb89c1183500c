//! Light types owned by the scene

use crate::foundation::math::Vec3;

/// Maximum number of lights per category a scene may hold
///
/// Shared with the GPU-side uniform arrays in [`crate::render::ubo`]; the two
/// must stay in lockstep because the shader block uses fixed-size arrays.
pub const MAX_LIGHTS_PER_KIND: usize = 5;

/// Phong color terms shared by all light categories
#[derive(Debug, Clone, PartialEq)]
pub struct LightColor {
    /// Ambient contribution
    pub ambient: Vec3,
    /// Diffuse contribution
    pub diffuse: Vec3,
    /// Specular contribution
    pub specular: Vec3,
}

impl Default for LightColor {
    fn default() -> Self {
        Self {
            ambient: Vec3::new(0.05, 0.05, 0.05),
            diffuse: Vec3::new(1.0, 1.0, 1.0),
            specular: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

/// Distance attenuation factors for point and spot lights
#[derive(Debug, Clone, PartialEq)]
pub struct Attenuation {
    /// Constant term
    pub constant: f32,
    /// Linear falloff per unit distance
    pub linear: f32,
    /// Exponential (quadratic) falloff
    pub exponential: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self {
            constant: 1.0,
            linear: 0.09,
            exponential: 0.032,
        }
    }
}

/// Light with parallel rays, like sunlight
#[derive(Debug, Clone)]
pub struct DirectionalLight {
    pub(crate) name: String,
    /// World-space direction the light travels in
    pub direction: Vec3,
    /// Color terms
    pub color: LightColor,
    /// Intensity multiplier
    pub intensity: f32,
}

impl DirectionalLight {
    /// Light shining along `direction` with default colors
    pub fn new(direction: Vec3) -> Self {
        Self {
            name: String::new(),
            direction: direction.normalize(),
            color: LightColor::default(),
            intensity: 1.0,
        }
    }

    /// Scene-unique name assigned at insertion
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Light radiating from a position in all directions
#[derive(Debug, Clone)]
pub struct PointLight {
    pub(crate) name: String,
    /// World-space position
    pub position: Vec3,
    /// Color terms
    pub color: LightColor,
    /// Intensity multiplier
    pub intensity: f32,
    /// Distance falloff
    pub attenuation: Attenuation,
}

impl PointLight {
    /// Point light at `position` with default colors and falloff
    pub fn new(position: Vec3) -> Self {
        Self {
            name: String::new(),
            position,
            color: LightColor::default(),
            intensity: 1.0,
            attenuation: Attenuation::default(),
        }
    }

    /// Scene-unique name assigned at insertion
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Point light restricted to a cone
#[derive(Debug, Clone)]
pub struct SpotLight {
    pub(crate) name: String,
    /// World-space position
    pub position: Vec3,
    /// World-space cone direction
    pub direction: Vec3,
    /// Cone half-angle cutoff in radians
    pub cutoff: f32,
    /// Color terms
    pub color: LightColor,
    /// Intensity multiplier
    pub intensity: f32,
    /// Distance falloff
    pub attenuation: Attenuation,
}

impl SpotLight {
    /// Spot light at `position` aimed along `direction` with the given cutoff
    pub fn new(position: Vec3, direction: Vec3, cutoff: f32) -> Self {
        Self {
            name: String::new(),
            position,
            direction: direction.normalize(),
            cutoff,
            color: LightColor::default(),
            intensity: 1.0,
            attenuation: Attenuation::default(),
        }
    }

    /// Scene-unique name assigned at insertion
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Shared reference to whichever light category a name lookup matched
#[derive(Debug)]
pub enum LightRef<'a> {
    /// Matched a directional light
    Directional(&'a DirectionalLight),
    /// Matched a point light
    Point(&'a PointLight),
    /// Matched a spot light
    Spot(&'a SpotLight),
}

/// Mutable reference to whichever light category a name lookup matched
#[derive(Debug)]
pub enum LightRefMut<'a> {
    /// Matched a directional light
    Directional(&'a mut DirectionalLight),
    /// Matched a point light
    Point(&'a mut PointLight),
    /// Matched a spot light
    Spot(&'a mut SpotLight),
}
