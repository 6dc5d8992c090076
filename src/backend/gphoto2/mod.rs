//! libgphoto2 device backend
//!
//! Thin safe layer over the C library. Each handle type owns exactly one
//! library object and is only freed through the matching release call.

mod ffi;

use super::{BackendResult, CameraEventKind, Deadline, DeviceBackend, StatusCode, WidgetInput, WidgetKind};
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_float, c_int, c_void};
use std::ptr::{self, NonNull};
use std::time::Duration;

pub struct GpContext(NonNull<ffi::GPContext>);
pub struct GpCamera(NonNull<ffi::Camera>);
pub struct GpAbilitiesList(NonNull<ffi::CameraAbilitiesList>);
pub struct GpAbilities(Box<ffi::CameraAbilities>);
pub struct GpPortList(NonNull<ffi::GPPortInfoList>);
/// Entry inside a port list; valid while the list is.
pub struct GpPortInfo(ffi::GPPortInfo);
pub struct GpWidget(NonNull<ffi::CameraWidget>);
/// Child of a fetched configuration root; valid while the root is.
pub struct GpNode(NonNull<ffi::CameraWidget>);

// SAFETY: each handle is owned by one session and only ever touched by the
// thread currently owning that session.
unsafe impl Send for GpContext {}
unsafe impl Send for GpCamera {}
unsafe impl Send for GpAbilitiesList {}
unsafe impl Send for GpPortList {}
unsafe impl Send for GpWidget {}

fn check(raw: c_int) -> BackendResult<usize> {
    StatusCode::check(raw)
}

fn check_unit(raw: c_int) -> BackendResult<()> {
    check(raw).map(drop)
}

fn c_string(value: &str) -> BackendResult<CString> {
    CString::new(value).map_err(|_| StatusCode::BAD_PARAMETERS)
}

fn c_index(index: usize) -> BackendResult<c_int> {
    c_int::try_from(index).map_err(|_| StatusCode::BAD_PARAMETERS)
}

fn c_millis(timeout: Duration) -> c_int {
    c_int::try_from(timeout.as_millis()).unwrap_or(c_int::MAX)
}

/// Copy a library-owned string.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn owned_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

/// Backend over the system libgphoto2.
#[derive(Debug, Default, Clone, Copy)]
pub struct Gphoto2Backend;

impl Gphoto2Backend {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceBackend for Gphoto2Backend {
    type Context = GpContext;
    type Camera = GpCamera;
    type AbilitiesList = GpAbilitiesList;
    type Abilities = GpAbilities;
    type PortList = GpPortList;
    type PortInfo = GpPortInfo;
    type Widget = GpWidget;
    type Node = GpNode;

    fn describe_status(&self, status: StatusCode) -> String {
        // SAFETY: gp_result_as_string returns a static string for any code.
        let text = unsafe { owned_string(ffi::gp_result_as_string(status.code())) };
        if text.is_empty() {
            status.default_description()
        } else {
            text
        }
    }

    fn context_new(&self) -> BackendResult<GpContext> {
        // SAFETY: no preconditions.
        let raw = unsafe { ffi::gp_context_new() };
        NonNull::new(raw).map(GpContext).ok_or(StatusCode::NO_MEMORY)
    }

    fn context_release(&self, context: GpContext) -> BackendResult<()> {
        // SAFETY: the context came from gp_context_new and is released once.
        unsafe { ffi::gp_context_unref(context.0.as_ptr()) };
        Ok(())
    }

    fn camera_new(&self) -> BackendResult<GpCamera> {
        let mut raw = ptr::null_mut();
        // SAFETY: out-pointer to a local.
        check(unsafe { ffi::gp_camera_new(&mut raw) })?;
        NonNull::new(raw).map(GpCamera).ok_or(StatusCode::NO_MEMORY)
    }

    fn camera_release(&self, camera: GpCamera) -> BackendResult<()> {
        // SAFETY: the camera came from gp_camera_new and is released once.
        check_unit(unsafe { ffi::gp_camera_unref(camera.0.as_ptr()) })
    }

    fn setting_set(&self, scope: &str, key: &str, value: &str) -> BackendResult<()> {
        let (scope, key, value) = (c_string(scope)?, c_string(key)?, c_string(value)?);
        // SAFETY: all three are valid NUL-terminated strings; the store copies
        // them and never writes through the non-const parameters.
        check_unit(unsafe {
            ffi::gp_setting_set(
                scope.as_ptr() as *mut c_char,
                key.as_ptr() as *mut c_char,
                value.as_ptr() as *mut c_char,
            )
        })
    }

    fn abilities_list_load(&self, context: &GpContext) -> BackendResult<GpAbilitiesList> {
        let mut raw = ptr::null_mut();
        // SAFETY: out-pointer to a local.
        check(unsafe { ffi::gp_abilities_list_new(&mut raw) })?;
        let list = NonNull::new(raw).map(GpAbilitiesList).ok_or(StatusCode::NO_MEMORY)?;
        // SAFETY: list and context are live.
        if let Err(status) = check(unsafe { ffi::gp_abilities_list_load(list.0.as_ptr(), context.0.as_ptr()) }) {
            let _ = self.abilities_list_release(list);
            return Err(status);
        }
        Ok(list)
    }

    fn abilities_list_release(&self, list: GpAbilitiesList) -> BackendResult<()> {
        // SAFETY: the list came from gp_abilities_list_new and is released once.
        check_unit(unsafe { ffi::gp_abilities_list_free(list.0.as_ptr()) })
    }

    fn abilities_lookup_model(&self, list: &GpAbilitiesList, model: &str) -> BackendResult<usize> {
        let model = c_string(model)?;
        // SAFETY: list is live and model is NUL-terminated.
        check(unsafe { ffi::gp_abilities_list_lookup_model(list.0.as_ptr(), model.as_ptr()) })
    }

    fn abilities_get(&self, list: &GpAbilitiesList, index: usize) -> BackendResult<GpAbilities> {
        let mut abilities = Box::<ffi::CameraAbilities>::default();
        // SAFETY: list is live and abilities points to a full CameraAbilities.
        check(unsafe {
            ffi::gp_abilities_list_get_abilities(list.0.as_ptr(), c_index(index)?, &mut *abilities)
        })?;
        Ok(GpAbilities(abilities))
    }

    fn camera_set_abilities(&self, camera: &mut GpCamera, abilities: &GpAbilities) -> BackendResult<()> {
        // SAFETY: camera is live; CameraAbilities is plain data copied by value.
        check_unit(unsafe { ffi::gp_camera_set_abilities(camera.0.as_ptr(), *abilities.0) })
    }

    fn port_list_load(&self) -> BackendResult<GpPortList> {
        let mut raw = ptr::null_mut();
        // SAFETY: out-pointer to a local.
        check(unsafe { ffi::gp_port_info_list_new(&mut raw) })?;
        let list = NonNull::new(raw).map(GpPortList).ok_or(StatusCode::NO_MEMORY)?;
        // SAFETY: list is live.
        if let Err(status) = check(unsafe { ffi::gp_port_info_list_load(list.0.as_ptr()) }) {
            let _ = self.port_list_release(list);
            return Err(status);
        }
        Ok(list)
    }

    fn port_list_release(&self, list: GpPortList) -> BackendResult<()> {
        // SAFETY: the list came from gp_port_info_list_new and is released once.
        check_unit(unsafe { ffi::gp_port_info_list_free(list.0.as_ptr()) })
    }

    fn port_lookup_path(&self, list: &GpPortList, path: &[u8]) -> BackendResult<usize> {
        let path = CString::new(path.to_vec()).map_err(|_| StatusCode::BAD_PARAMETERS)?;
        // SAFETY: list is live and path is NUL-terminated.
        check(unsafe { ffi::gp_port_info_list_lookup_path(list.0.as_ptr(), path.as_ptr()) })
    }

    fn port_info_get(&self, list: &GpPortList, index: usize) -> BackendResult<GpPortInfo> {
        let mut info: ffi::GPPortInfo = ptr::null_mut();
        // SAFETY: list is live; info is an out-pointer to a local.
        check(unsafe { ffi::gp_port_info_list_get_info(list.0.as_ptr(), c_index(index)?, &mut info) })?;
        Ok(GpPortInfo(info))
    }

    fn camera_set_port_info(&self, camera: &mut GpCamera, info: &GpPortInfo) -> BackendResult<()> {
        // SAFETY: camera is live; info belongs to a live port list.
        check_unit(unsafe { ffi::gp_camera_set_port_info(camera.0.as_ptr(), info.0) })
    }

    /// libgphoto2 cannot interrupt a running handshake. The timeout is set on
    /// the camera's port so every transport read and write is bounded by it,
    /// and a handshake that still overruns the deadline is exited again and
    /// reported as [`StatusCode::TIMEOUT`].
    fn camera_init(&self, camera: &mut GpCamera, context: &GpContext, timeout: Duration) -> BackendResult<()> {
        let deadline = Deadline::start(timeout);
        // SAFETY: camera is live; its port field is either null or a live port.
        let port = unsafe { (*camera.0.as_ptr()).port };
        if port.is_null() {
            return Err(StatusCode::UNKNOWN_PORT);
        }
        // SAFETY: port belongs to the live camera.
        check_unit(unsafe { ffi::gp_port_set_timeout(port, c_millis(timeout)) })?;
        // SAFETY: camera and context are live.
        check_unit(unsafe { ffi::gp_camera_init(camera.0.as_ptr(), context.0.as_ptr()) })?;
        if let Err(status) = deadline.check() {
            log::warn!("Camera handshake finished after {:?}, past the {:?} limit", deadline.elapsed(), timeout);
            let _ = self.camera_exit(camera, context);
            return Err(status);
        }
        Ok(())
    }

    fn camera_exit(&self, camera: &mut GpCamera, context: &GpContext) -> BackendResult<()> {
        // SAFETY: camera and context are live.
        check_unit(unsafe { ffi::gp_camera_exit(camera.0.as_ptr(), context.0.as_ptr()) })
    }

    fn config_fetch(&self, camera: &mut GpCamera, context: &GpContext) -> BackendResult<GpWidget> {
        let mut raw = ptr::null_mut();
        // SAFETY: camera and context are live; raw is an out-pointer.
        check(unsafe { ffi::gp_camera_get_config(camera.0.as_ptr(), &mut raw, context.0.as_ptr()) })?;
        NonNull::new(raw).map(GpWidget).ok_or(StatusCode::GENERIC)
    }

    fn config_commit(&self, camera: &mut GpCamera, context: &GpContext, root: &GpWidget) -> BackendResult<()> {
        // SAFETY: camera, root and context are live.
        check_unit(unsafe { ffi::gp_camera_set_config(camera.0.as_ptr(), root.0.as_ptr(), context.0.as_ptr()) })
    }

    fn config_release(&self, root: GpWidget) -> BackendResult<()> {
        // SAFETY: root came from gp_camera_get_config and is released once.
        check_unit(unsafe { ffi::gp_widget_free(root.0.as_ptr()) })
    }

    fn widget_child_by_name(&self, root: &GpWidget, name: &str) -> BackendResult<GpNode> {
        let name = c_string(name)?;
        let mut raw = ptr::null_mut();
        // SAFETY: root is live; name is NUL-terminated; raw is an out-pointer.
        check(unsafe { ffi::gp_widget_get_child_by_name(root.0.as_ptr(), name.as_ptr(), &mut raw) })?;
        NonNull::new(raw).map(GpNode).ok_or(StatusCode::BAD_PARAMETERS)
    }

    fn widget_kind(&self, node: &GpNode) -> BackendResult<WidgetKind> {
        let mut kind: ffi::CameraWidgetType = 0;
        // SAFETY: node is live; kind is an out-pointer.
        check(unsafe { ffi::gp_widget_get_type(node.0.as_ptr(), &mut kind) })?;
        Ok(WidgetKind::from_raw(kind as c_int))
    }

    fn widget_text(&self, node: &GpNode) -> BackendResult<String> {
        let mut value: *const c_char = ptr::null();
        // SAFETY: for text-valued widgets the value is a char pointer owned by the widget.
        check(unsafe { ffi::gp_widget_get_value(node.0.as_ptr(), &mut value as *mut _ as *mut c_void) })?;
        // SAFETY: value is null or a NUL-terminated string owned by the widget.
        Ok(unsafe { owned_string(value) })
    }

    fn widget_float(&self, node: &GpNode) -> BackendResult<f32> {
        let mut value: c_float = 0.0;
        // SAFETY: range widgets store a float.
        check(unsafe { ffi::gp_widget_get_value(node.0.as_ptr(), &mut value as *mut _ as *mut c_void) })?;
        Ok(value)
    }

    fn widget_int(&self, node: &GpNode) -> BackendResult<i32> {
        let mut value: c_int = 0;
        // SAFETY: toggle and date widgets store an int.
        check(unsafe { ffi::gp_widget_get_value(node.0.as_ptr(), &mut value as *mut _ as *mut c_void) })?;
        Ok(value)
    }

    fn widget_range(&self, node: &GpNode) -> BackendResult<(f32, f32, f32)> {
        let (mut min, mut max, mut step): (c_float, c_float, c_float) = (0.0, 0.0, 0.0);
        // SAFETY: node is live; all three are out-pointers.
        check(unsafe { ffi::gp_widget_get_range(node.0.as_ptr(), &mut min, &mut max, &mut step) })?;
        Ok((min, max, step))
    }

    fn widget_choice_count(&self, node: &GpNode) -> BackendResult<usize> {
        // SAFETY: node is live.
        check(unsafe { ffi::gp_widget_count_choices(node.0.as_ptr()) })
    }

    fn widget_choice(&self, node: &GpNode, index: usize) -> BackendResult<String> {
        let mut value: *const c_char = ptr::null();
        // SAFETY: node is live; value is an out-pointer.
        check(unsafe { ffi::gp_widget_get_choice(node.0.as_ptr(), c_index(index)?, &mut value) })?;
        // SAFETY: value is null or a NUL-terminated string owned by the widget.
        Ok(unsafe { owned_string(value) })
    }

    fn widget_set(&self, node: &GpNode, value: &WidgetInput) -> BackendResult<()> {
        let widget = node.0.as_ptr();
        let raw = match value {
            WidgetInput::Int(v) => {
                let v: c_int = *v;
                // SAFETY: int-valued widgets read a c_int through the pointer.
                unsafe { ffi::gp_widget_set_value(widget, &v as *const _ as *const c_void) }
            }
            WidgetInput::Float(v) => {
                let v: c_float = *v;
                // SAFETY: range widgets read a float through the pointer.
                unsafe { ffi::gp_widget_set_value(widget, &v as *const _ as *const c_void) }
            }
            WidgetInput::Text(v) => {
                let v = c_string(v)?;
                // SAFETY: text-valued widgets copy the string the pointer names.
                unsafe { ffi::gp_widget_set_value(widget, v.as_ptr() as *const c_void) }
            }
        };
        check_unit(raw)
    }

    fn trigger_capture(&self, camera: &mut GpCamera, context: &GpContext) -> BackendResult<()> {
        // SAFETY: camera and context are live.
        check_unit(unsafe { ffi::gp_camera_trigger_capture(camera.0.as_ptr(), context.0.as_ptr()) })
    }

    fn wait_for_event(
        &self,
        camera: &mut GpCamera,
        context: &GpContext,
        timeout: Duration,
    ) -> BackendResult<CameraEventKind> {
        let mut kind: ffi::CameraEventType = 0;
        let mut data: *mut c_void = ptr::null_mut();
        // SAFETY: camera and context are live; kind and data are out-pointers.
        let raw = unsafe {
            ffi::gp_camera_wait_for_event(
                camera.0.as_ptr(),
                c_millis(timeout),
                &mut kind,
                &mut data,
                context.0.as_ptr(),
            )
        };
        if !data.is_null() {
            // SAFETY: event data is malloc'd by the library and handed to the caller.
            unsafe { ffi::free(data) };
        }
        check(raw)?;
        Ok(CameraEventKind::from_raw(kind as c_int))
    }
}
