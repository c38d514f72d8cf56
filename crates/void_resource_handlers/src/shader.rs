//! Shader resources
//!
//! A shader config lists its stages, each with inline source or a source
//! file. File sources are joined before the shader is handed to the
//! backend; any stage failure fails the shader. Changed stage files are
//! resubmitted in place.

use serde::{Deserialize, Serialize};
use void_resource::{
    AssetCompletion, AssetRequest, JoinBarrier, JoinProgress, LoadTask, LoadedAsset, Name, RequestInfo, Resource,
    ResourceError, ResourceHandler, ResourceKind, ResourceResult, ResourceState, ResourceSystem, ShaderDesc,
    ShaderId, ShaderStage, ShaderStageSource, TaskStatus, WatchId,
};

use crate::common::{load_config, payload_mut};

/// One stage as written in config files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub stage: ShaderStage,
    /// Source file within the shader's package
    #[serde(default)]
    pub file: Option<String>,
    /// Inline source
    #[serde(default)]
    pub source: Option<String>,
}

/// Shader definition as written in config files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShaderConfig {
    #[serde(default)]
    pub package: String,
    pub stages: Vec<StageConfig>,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub uniforms: Vec<String>,
}

/// Payload of a shader resource
#[derive(Clone, Debug, PartialEq)]
pub struct Shader {
    pub desc: ShaderDesc,
    pub backend: Option<ShaderId>,
    /// Watched stage files and the stage index they feed
    pub watches: Vec<(WatchId, usize)>,
}

impl Shader {
    /// Source of one stage
    pub fn stage_source(&self, stage: ShaderStage) -> Option<&str> {
        self.desc
            .stages
            .iter()
            .find(|s| s.stage == stage)
            .map(|s| s.source.as_str())
    }
}

fn acquire(
    system: &mut ResourceSystem,
    resource: &mut Resource,
    desc: ShaderDesc,
    watches: Vec<(WatchId, usize)>,
) -> ResourceResult<()> {
    let id = system.backend().acquire_shader(&desc)?;
    resource.set_payload(Shader {
        desc,
        backend: Some(id),
        watches,
    });
    resource.mark_loaded();
    Ok(())
}

/// Collects stage sources loaded asynchronously
struct StageJoin {
    barrier: JoinBarrier<String>,
    /// Stage index of each barrier entry
    stage_indices: Vec<usize>,
    desc: Option<ShaderDesc>,
    watches: Vec<(WatchId, usize)>,
    first_error: Option<ResourceError>,
}

impl LoadTask for StageJoin {
    fn on_complete(
        &mut self,
        system: &mut ResourceSystem,
        resource: &mut Resource,
        completion: AssetCompletion,
    ) -> ResourceResult<TaskStatus> {
        let file = completion.request.name.clone();
        let source = match completion.result.and_then(LoadedAsset::into_text) {
            Ok(source) => Some(source),
            Err(e) => {
                log::warn!("Shader {}: stage source {} failed: {}", resource.name(), file, e);
                self.first_error.get_or_insert(e.into());
                None
            }
        };

        match self.barrier.complete(&file, source) {
            JoinProgress::Pending => Ok(TaskStatus::Pending),
            JoinProgress::Ready(mut entries) => {
                if let Some(err) = self.first_error.take() {
                    return Err(err);
                }
                let mut desc = self
                    .desc
                    .take()
                    .ok_or_else(|| ResourceError::HandlerContract(resource.name().clone(), "stage join fired twice"))?;
                for (entry, &index) in entries.iter_mut().zip(&self.stage_indices) {
                    if let Some(source) = entry.take_payload() {
                        desc.stages[index].source = source;
                    }
                }
                acquire(system, resource, desc, std::mem::take(&mut self.watches))?;
                Ok(TaskStatus::Done)
            }
            JoinProgress::Unmatched => {
                log::warn!("Shader {}: unexpected stage source {}", resource.name(), file);
                Ok(TaskStatus::Pending)
            }
            JoinProgress::Spent => Ok(TaskStatus::Done),
        }
    }
}

fn build_shader(
    system: &mut ResourceSystem,
    resource: &mut Resource,
    config: ShaderConfig,
    synchronous: bool,
) -> ResourceResult<()> {
    let name = resource.name().clone();
    if config.stages.is_empty() {
        return Err(ResourceError::invalid_config(&name, "shader has no stages"));
    }

    let mut desc = ShaderDesc {
        name: name.clone(),
        stages: Vec::with_capacity(config.stages.len()),
        attributes: config.attributes,
        uniforms: config.uniforms,
    };
    let mut files = Vec::new();
    let mut watches = Vec::new();

    for (index, stage) in config.stages.into_iter().enumerate() {
        let source = match (stage.file, stage.source) {
            (Some(file), None) => {
                let request = AssetRequest::text(file, config.package.as_str()).watched();
                if let Some(watch) = system.watch(resource.handle(), &request) {
                    watches.push((watch, index));
                }
                files.push((index, request));
                String::new()
            }
            (None, Some(source)) => source,
            _ => {
                return Err(ResourceError::invalid_config(
                    &name,
                    format!("stage {} needs exactly one of file or source", index),
                ))
            }
        };
        desc.stages.push(ShaderStageSource {
            stage: stage.stage,
            source,
        });
    }

    if files.is_empty() {
        return acquire(system, resource, desc, watches);
    }

    if synchronous {
        for (index, request) in &files {
            desc.stages[*index].source = system.load_asset(request)?.into_text()?;
        }
        return acquire(system, resource, desc, watches);
    }

    let mut barrier = JoinBarrier::new();
    for (_, request) in &files {
        barrier.push_requested(request.name.clone());
    }
    resource.set_state(ResourceState::Loading);
    let task = system.spawn_task(
        resource.handle(),
        Box::new(StageJoin {
            barrier,
            stage_indices: files.iter().map(|(index, _)| *index).collect(),
            desc: Some(desc),
            watches,
            first_error: None,
        }),
    );
    for (_, request) in files {
        system.dispatch(task, request)?;
    }
    Ok(())
}

/// Builds shaders from JSON configs
#[derive(Default)]
pub struct ShaderHandler;

impl ShaderHandler {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceHandler for ShaderHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Shader
    }

    fn supports_hot_reload(&self) -> bool {
        true
    }

    fn request(
        &mut self,
        system: &mut ResourceSystem,
        resource: &mut Resource,
        info: RequestInfo,
    ) -> ResourceResult<()> {
        let source = info.expect_config(resource.name())?;
        let synchronous = info.synchronous;
        load_config(system, resource, source, synchronous, move |system, resource, config| {
            build_shader(system, resource, config, synchronous)
        })
    }

    fn release(&mut self, system: &mut ResourceSystem, resource: &mut Resource) {
        if let Some(Shader { backend: Some(id), .. }) = resource.take_payload::<Shader>() {
            system.backend().release_shader(id);
        }
    }

    fn hot_reload(
        &mut self,
        system: &mut ResourceSystem,
        resource: &mut Resource,
        asset: LoadedAsset,
        watch: WatchId,
    ) -> ResourceResult<()> {
        let name: Name = resource.name().clone();
        let source = asset.into_text()?;
        let shader = payload_mut::<Shader>(resource, "shader payload missing")?;
        let index = shader
            .watches
            .iter()
            .find(|(w, _)| *w == watch)
            .map(|(_, index)| *index)
            .ok_or_else(|| ResourceError::HandlerContract(name.clone(), "watch does not feed any stage"))?;
        let id = shader
            .backend
            .ok_or_else(|| ResourceError::HandlerContract(name, "shader has no backend object"))?;

        let mut desc = shader.desc.clone();
        desc.stages[index].source = source;
        system.backend().reload_shader(id, &desc)?;
        shader.desc = desc;
        resource.mark_loaded();
        Ok(())
    }
}
