//! Model-specific setting labels
//!
//! Cameras do not advertise a flat list of their widgets, so a listing view
//! is built by asking for a known set of labels. These are the ones exposed
//! by Canon EOS bodies over PTP/IP.

/// Labels known to be present on Canon EOS cameras.
pub const EOS_KNOWN_SETTINGS: &[&str] = &[
    "uilock",
    "bulb",
    "drivemode",
    "focusmode",
    "autofocusdrive",
    "manualfocusdrive",
    "eoszoom",
    "eoszoomposition",
    "eosviewfinder",
    "eosremoterelease",
    "serialnumber",
    "manufacturer",
    "cameramodel",
    "deviceversion",
    "model",
    "batterylevel",
    "lensname",
    "eosserialnumber",
    "shuttercounter",
    "availableshots",
    "reviewtime",
    "output",
    "evfmode",
    "ownername",
    "artist",
    "copyright",
    "autopoweroff",
    "imageformat",
    "imageformatsd",
    "iso",
    "whitebalance",
    "colortemperature",
    "whitebalanceadjusta",
    "whitebalanceadjustb",
    "whitebalancexa",
    "whitebalancexb",
    "colorspace",
    "exposurecompensation",
    "autoexposuremode",
    "picturestyle",
    "shutterspeed",
    "bracketmode",
    "aeb",
    "aperture",
    "capturetarget",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_labels_are_unique() {
        let unique: HashSet<_> = EOS_KNOWN_SETTINGS.iter().collect();
        assert_eq!(unique.len(), EOS_KNOWN_SETTINGS.len());
    }
}
