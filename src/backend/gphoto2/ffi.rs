//! libgphoto2 and libgphoto2_port bindings, generated by `build.rs` from the
//! installed headers.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(dead_code)]
#![allow(clippy::all)]

include!(concat!(env!("OUT_DIR"), "/gphoto2_bindings.rs"));
