//! Plumbing shared by the built-in handlers

use serde::de::DeserializeOwned;
use void_resource::{
    AssetCompletion, AssetRequest, ConfigSource, LoadTask, LoadedAsset, Name, Resource, ResourceError,
    ResourceResult, ResourceState, ResourceSystem, TaskStatus,
};

/// Parse a JSON resource config
pub(crate) fn parse_config<T: DeserializeOwned>(name: &Name, text: &str) -> ResourceResult<T> {
    serde_json::from_str(text).map_err(|e| ResourceError::invalid_config(name, e))
}

/// Load task that finishes a build from one asset
pub(crate) struct AssetContinuation<F> {
    build: Option<F>,
}

impl<F> LoadTask for AssetContinuation<F>
where
    F: FnOnce(&mut ResourceSystem, &mut Resource, LoadedAsset) -> ResourceResult<()> + Send,
{
    fn on_complete(
        &mut self,
        system: &mut ResourceSystem,
        resource: &mut Resource,
        completion: AssetCompletion,
    ) -> ResourceResult<TaskStatus> {
        let asset = completion.result?;
        let build = self
            .build
            .take()
            .ok_or_else(|| ResourceError::HandlerContract(resource.name().clone(), "continuation ran twice"))?;
        build(system, resource, asset)?;
        Ok(TaskStatus::Done)
    }
}

/// Load `request` and hand it to `build`, now or from a load task
///
/// `build` is responsible for reaching `Loaded` or chaining another load.
pub(crate) fn load_then<F>(
    system: &mut ResourceSystem,
    resource: &mut Resource,
    request: AssetRequest,
    synchronous: bool,
    build: F,
) -> ResourceResult<()>
where
    F: FnOnce(&mut ResourceSystem, &mut Resource, LoadedAsset) -> ResourceResult<()> + Send + 'static,
{
    if synchronous {
        let asset = system.load_asset(&request)?;
        return build(system, resource, asset);
    }

    resource.set_state(ResourceState::Loading);
    let task = system.spawn_task(resource.handle(), Box::new(AssetContinuation { build: Some(build) }));
    system.dispatch(task, request)?;
    Ok(())
}

/// Resolve a JSON config from an asset or inline text and hand it to `build`
pub(crate) fn load_config<T, F>(
    system: &mut ResourceSystem,
    resource: &mut Resource,
    source: ConfigSource<'_>,
    synchronous: bool,
    build: F,
) -> ResourceResult<()>
where
    T: DeserializeOwned + 'static,
    F: FnOnce(&mut ResourceSystem, &mut Resource, T) -> ResourceResult<()> + Send + 'static,
{
    match source {
        ConfigSource::Inline(text) => {
            let config = parse_config(resource.name(), text)?;
            build(system, resource, config)
        }
        ConfigSource::Asset(request) => {
            load_then(system, resource, request.clone(), synchronous, move |system, resource, asset| {
                let config = parse_config(resource.name(), asset.text()?)?;
                build(system, resource, config)
            })
        }
    }
}

/// Payload accessor that reports a missing payload as a contract error
pub(crate) fn payload_mut<'a, T: 'static>(resource: &'a mut Resource, what: &'static str) -> ResourceResult<&'a mut T> {
    let name = resource.name().clone();
    resource
        .payload_mut::<T>()
        .ok_or(ResourceError::HandlerContract(name, what))
}
