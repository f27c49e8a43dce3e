use crate::sensing::{SensingError, SensingProvider, SensingStreams, SimulatedSensing};
use openxr::{ApplicationInfo, Entry, ExtensionSet, FormFactor, Instance};

/// Sensing provider backed by an OpenXR runtime. Bootstraps the instance and
/// system; hand/mesh anchor polling is not wired yet, so the streams come
/// from the simulation fallback.
pub struct OpenXrSensing {
    instance: Instance,
    system_id: openxr::SystemId,
    fallback: SimulatedSensing,
}

impl OpenXrSensing {
    pub fn initialize() -> Result<Self, SensingError> {
        let entry = Entry::load().map_err(|err| {
            SensingError::Unavailable(format!("failed to load OpenXR loader: {err}"))
        })?;
        let app_info = ApplicationInfo {
            application_name: "Pinboard Spatial",
            application_version: 1,
            engine_name: "Pinboard Spatial",
            engine_version: 1,
        };

        let enabled_extensions = ExtensionSet::default();

        let instance = entry
            .create_instance(&app_info, &enabled_extensions, &[])
            .map_err(|err| {
                SensingError::Unavailable(format!("failed to create OpenXR instance: {err}"))
            })?;

        let system_id = instance
            .system(FormFactor::HEAD_MOUNTED_DISPLAY)
            .map_err(|err| {
                SensingError::Unavailable(format!("failed to query OpenXR system: {err}"))
            })?;

        Ok(Self {
            instance,
            system_id,
            fallback: SimulatedSensing::new(),
        })
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn system_id(&self) -> openxr::SystemId {
        self.system_id
    }
}

impl SensingProvider for OpenXrSensing {
    fn label(&self) -> &'static str {
        "OpenXR Sensing"
    }

    fn start(&mut self) -> Result<SensingStreams, SensingError> {
        // TODO: feed the streams from XR_EXT_hand_tracking and scene
        // reconstruction once session creation is wired in.
        self.fallback.start()
    }
}
