//! Internal synthesis pipeline stages

pub(crate) mod affinity;
pub(crate) mod containers;
pub(crate) mod pod_template;
pub(crate) mod service;
pub(crate) mod volumes;
