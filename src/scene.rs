use anyhow::{anyhow, bail, Context, Result};
use glam::Vec3;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::controls::OrbitSettings;
use crate::march::{DirectionalLight, ExhaustionPolicy, MarchSettings, ShadingSettings};

/// Everything needed to set up a ray-marched scene. Missing sections fall back
/// to the defaults of the stock demo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    pub camera: CameraConfig,
    pub light: DirectionalLight,
    pub march: MarchSettings,
    pub shading: ShadingSettings,
    pub background: Background,
    pub controls: OrbitSettings,
    /// Upper bound on physical pixels per logical pixel of the surface.
    pub max_pixel_ratio: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            light: DirectionalLight::default(),
            march: MarchSettings::default(),
            shading: ShadingSettings::default(),
            background: Background::default(),
            controls: OrbitSettings::default(),
            max_pixel_ratio: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 75.0,
            near: 0.1,
            far: 100.0,
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
        }
    }
}

/// Clear colour in linear `[0, 1]` components. Scene files give it as an
/// sRGB byte triplet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Background(pub Vec3);

impl Default for Background {
    fn default() -> Self {
        // #3399ee
        Self(srgb_bytes_to_linear([51.0, 153.0, 238.0]))
    }
}

/// Decodes one sRGB-encoded channel in `[0, 1]` to linear light.
pub fn srgb_to_linear(channel: f32) -> f32 {
    if channel <= 0.04045 {
        channel / 12.92
    } else {
        ((channel + 0.055) / 1.055).powf(2.4)
    }
}

fn srgb_bytes_to_linear(bytes: [f32; 3]) -> Vec3 {
    Vec3::from(bytes.map(|byte| srgb_to_linear(byte / 255.0)))
}

impl SceneConfig {
    /// Parses a `<scene>` document.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let root = document.root_element();
        if !root.has_tag_name("scene") {
            bail!("expected <scene> root element, found <{}>", root.tag_name().name());
        }

        let mut config = Self::default();

        if let Some(node) = child(&root, "camera") {
            let camera = &mut config.camera;
            camera.fov = parse_f32(optional_text(&node, "fov"), camera.fov)?;
            camera.near = parse_f32(optional_text(&node, "near"), camera.near)?;
            camera.far = parse_f32(optional_text(&node, "far"), camera.far)?;
            camera.position = parse_vec3(optional_text(&node, "position"), camera.position)?;
            camera.target = parse_vec3(optional_text(&node, "target"), camera.target)?;
        }

        if let Some(node) = child(&root, "light") {
            let light = &mut config.light;
            light.direction = parse_vec3(optional_text(&node, "direction"), light.direction)?;
            light.color = parse_color(optional_text(&node, "color"), light.color)?;
        }

        if let Some(node) = child(&root, "march") {
            let march = &mut config.march;
            march.epsilon = parse_f32(optional_text(&node, "epsilon"), march.epsilon)?;
            march.max_distance =
                parse_f32(optional_text(&node, "max-distance"), march.max_distance)?;
            march.max_steps = parse_u32(optional_text(&node, "max-steps"), march.max_steps)?;
            if let Some(policy) = optional_text(&node, "on-exhaustion") {
                march.on_exhaustion = ExhaustionPolicy::from_name(&policy)
                    .ok_or_else(|| anyhow!("unknown exhaustion policy `{policy}`"))?;
            }
        }

        if let Some(node) = child(&root, "shading") {
            let shading = &mut config.shading;
            shading.diffuse = parse_f32(optional_text(&node, "diffuse"), shading.diffuse)?;
            shading.specular = parse_f32(optional_text(&node, "specular"), shading.specular)?;
            shading.ambient = parse_f32(optional_text(&node, "ambient"), shading.ambient)?;
            shading.shininess = parse_f32(optional_text(&node, "shininess"), shading.shininess)?;
        }

        config.background = Background(parse_color(
            optional_text(&root, "background"),
            config.background.0,
        )?);

        config.max_pixel_ratio = parse_f32(
            optional_text(&root, "max-pixel-ratio"),
            config.max_pixel_ratio,
        )?;

        if let Some(node) = child(&root, "controls") {
            let controls = &mut config.controls;
            controls.damping = parse_f32(optional_text(&node, "damping"), controls.damping)?;
            controls.rotate_speed =
                parse_f32(optional_text(&node, "rotate-speed"), controls.rotate_speed)?;
            controls.zoom_speed =
                parse_f32(optional_text(&node, "zoom-speed"), controls.zoom_speed)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects values the camera or the march loop cannot work with. NaN and
    /// infinities fail every check.
    pub fn validate(&self) -> Result<()> {
        let camera = &self.camera;
        if !(camera.fov > 0.0 && camera.fov < 180.0) {
            bail!("camera fov must lie in (0, 180) degrees, got {}", camera.fov);
        }
        if !(camera.near > 0.0 && camera.near.is_finite()) {
            bail!("camera near distance must be positive, got {}", camera.near);
        }
        if !(camera.far > camera.near && camera.far.is_finite()) {
            bail!(
                "camera far distance ({}) must exceed near distance ({})",
                camera.far,
                camera.near
            );
        }
        if !(camera.position.is_finite() && camera.target.is_finite()) {
            bail!("camera position and target must be finite");
        }
        if camera.position == camera.target {
            bail!("camera position and target coincide");
        }
        if !(self.march.epsilon > 0.0 && self.march.epsilon.is_finite()) {
            bail!("march epsilon must be positive, got {}", self.march.epsilon);
        }
        if !(self.march.max_distance > 0.0 && self.march.max_distance.is_finite()) {
            bail!(
                "march max distance must be positive, got {}",
                self.march.max_distance
            );
        }
        if self.march.max_steps == 0 {
            bail!("march max steps must be at least 1");
        }
        if !(self.light.direction.is_finite() && self.light.direction.length_squared() > 0.0) {
            bail!("light direction must be finite and non-zero");
        }
        if !self.light.color.is_finite() {
            bail!("light color must be finite");
        }
        let shading = &self.shading;
        if ![shading.diffuse, shading.specular, shading.ambient, shading.shininess]
            .iter()
            .all(|value| value.is_finite())
        {
            bail!("shading coefficients must be finite");
        }
        if !(self.controls.damping > 0.0 && self.controls.damping <= 1.0) {
            bail!(
                "controls damping must lie in (0, 1], got {}",
                self.controls.damping
            );
        }
        if !(self.controls.rotate_speed.is_finite() && self.controls.zoom_speed.is_finite()) {
            bail!("controls speeds must be finite");
        }
        if !(self.max_pixel_ratio > 0.0 && self.max_pixel_ratio.is_finite()) {
            bail!(
                "max pixel ratio must be positive, got {}",
                self.max_pixel_ratio
            );
        }
        Ok(())
    }
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name(tag))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_components(value: &str, what: &str) -> Result<[f32; 3]> {
    let numbers = value
        .split_whitespace()
        .map(|component| {
            component
                .parse::<f32>()
                .with_context(|| format!("invalid {what} component `{component}`"))
        })
        .collect::<Result<Vec<_>>>()?;
    match numbers.as_slice() {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => Err(anyhow!(
            "{what} needs 3 components, got {} in `{value}`",
            numbers.len()
        )),
    }
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    Ok(Vec3::from(parse_components(&value, "vector")?))
}

fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    Ok(srgb_bytes_to_linear(parse_components(&value, "color")?))
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float `{value}`: {err}")),
        None => Ok(default),
    }
}

fn parse_u32(value: Option<String>, default: u32) -> Result<u32> {
    match value {
        Some(value) => value
            .parse::<u32>()
            .map_err(|err| anyhow!("failed to parse integer `{value}`: {err}")),
        None => Ok(default),
    }
}
