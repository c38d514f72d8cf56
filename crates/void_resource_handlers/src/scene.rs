//! Scene resources
//!
//! Scenes are flat JSON node lists. A node names its parent, which must be
//! declared earlier in the list. Scenes are CPU-side only; attachments that
//! reference other resources are kept by name for the caller to request.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use void_resource::{
    Name, RequestInfo, Resource, ResourceError, ResourceHandler, ResourceKind, ResourceResult, ResourceSystem,
};

use crate::common::load_config;

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn identity_rotation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

/// Node transform relative to its parent
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default)]
    pub position: [f32; 3],
    /// Quaternion, xyzw
    #[serde(default = "identity_rotation")]
    pub rotation: [f32; 4],
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: identity_rotation(),
            scale: default_scale(),
        }
    }
}

fn default_colour() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_intensity() -> f32 {
    1.0
}

/// Things hung off a scene node
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Attachment {
    StaticMesh {
        mesh: String,
    },
    PointLight {
        #[serde(default = "default_colour")]
        colour: [f32; 3],
        #[serde(default = "default_intensity")]
        intensity: f32,
        #[serde(default)]
        range: Option<f32>,
    },
    DirectionalLight {
        #[serde(default = "default_colour")]
        colour: [f32; 3],
        #[serde(default = "default_intensity")]
        intensity: f32,
        direction: [f32; 3],
    },
    Skybox {
        cubemap: String,
    },
}

/// One node as written in config files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Scene definition as written in config files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

/// One resolved scene node
#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    pub name: Name,
    /// Index of the parent node
    pub parent: Option<usize>,
    pub transform: Transform,
    pub attachments: Vec<Attachment>,
}

/// Payload of a scene resource
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    pub name: Name,
    pub nodes: Vec<SceneNode>,
}

impl Scene {
    /// Resolve parent references
    pub fn from_config(resource: &Name, config: SceneConfig) -> ResourceResult<Self> {
        let mut index: HashMap<Name, usize> = HashMap::with_capacity(config.nodes.len());
        let mut nodes = Vec::with_capacity(config.nodes.len());

        for (i, node) in config.nodes.into_iter().enumerate() {
            let name = Name::new(&node.name);
            let parent = match &node.parent {
                None => None,
                Some(parent) => Some(*index.get(&Name::new(parent)).ok_or_else(|| {
                    ResourceError::invalid_config(
                        resource,
                        format!("node {} refers to undeclared parent {}", node.name, parent),
                    )
                })?),
            };
            if index.insert(name.clone(), i).is_some() {
                return Err(ResourceError::invalid_config(
                    resource,
                    format!("duplicate node name {}", node.name),
                ));
            }
            nodes.push(SceneNode {
                name,
                parent,
                transform: node.transform,
                attachments: node.attachments,
            });
        }

        let name = if config.name.is_empty() {
            resource.clone()
        } else {
            Name::new(config.name)
        };
        Ok(Self { name, nodes })
    }

    /// Nodes without a parent
    pub fn roots(&self) -> impl Iterator<Item = (usize, &SceneNode)> {
        self.nodes.iter().enumerate().filter(|(_, n)| n.parent.is_none())
    }

    /// Direct children of a node
    pub fn children(&self, parent: usize) -> impl Iterator<Item = (usize, &SceneNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.parent == Some(parent))
    }

    /// Find a node by name
    pub fn find(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name.as_str() == name)
    }

    /// Every mesh referenced by an attachment
    pub fn meshes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().flat_map(|n| &n.attachments).filter_map(|a| match a {
            Attachment::StaticMesh { mesh } => Some(mesh.as_str()),
            _ => None,
        })
    }
}

/// Builds scenes from JSON configs
#[derive(Default)]
pub struct SceneHandler;

impl SceneHandler {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceHandler for SceneHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Scene
    }

    fn request(
        &mut self,
        system: &mut ResourceSystem,
        resource: &mut Resource,
        info: RequestInfo,
    ) -> ResourceResult<()> {
        let source = info.expect_config(resource.name())?;
        load_config(system, resource, source, info.synchronous, |_, resource, config: SceneConfig| {
            let scene = Scene::from_config(resource.name(), config)?;
            log::debug!("Scene {}: {} nodes", scene.name, scene.nodes.len());
            resource.set_payload(scene);
            resource.mark_loaded();
            Ok(())
        })
    }

    fn release(&mut self, _system: &mut ResourceSystem, resource: &mut Resource) {
        resource.take_payload::<Scene>();
    }
}
