use std::fmt;

/// Why a `rivalcfg` invocation produced no usable output.
#[derive(Debug)]
pub enum ReadError {
    Spawn(std::io::Error),
    Exit { code: Option<i32>, stderr: String },
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "failed to run command: {e}"),
            Self::Exit { code: Some(code), stderr } => {
                write!(f, "command exited with status {code}: {stderr}")
            }
            Self::Exit { code: None, stderr } => {
                write!(f, "command terminated by signal: {stderr}")
            }
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
            Self::Exit { .. } => None,
        }
    }
}

impl From<std::io::Error> for ReadError {
    fn from(e: std::io::Error) -> Self {
        Self::Spawn(e)
    }
}

#[derive(Debug)]
pub enum TrayError {
    Io(std::io::Error),
    Image(image::ImageError),
    Icon(tray_icon::BadIcon),
    Menu(tray_icon::menu::Error),
    Build(tray_icon::Error),
}

impl fmt::Display for TrayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Image(e) => write!(f, "image error: {e}"),
            Self::Icon(e) => write!(f, "bad icon: {e}"),
            Self::Menu(e) => write!(f, "menu error: {e}"),
            Self::Build(e) => write!(f, "tray error: {e}"),
        }
    }
}

impl std::error::Error for TrayError {}

impl From<std::io::Error> for TrayError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<image::ImageError> for TrayError {
    fn from(e: image::ImageError) -> Self {
        Self::Image(e)
    }
}

impl From<tray_icon::BadIcon> for TrayError {
    fn from(e: tray_icon::BadIcon) -> Self {
        Self::Icon(e)
    }
}

impl From<tray_icon::menu::Error> for TrayError {
    fn from(e: tray_icon::menu::Error) -> Self {
        Self::Menu(e)
    }
}

impl From<tray_icon::Error> for TrayError {
    fn from(e: tray_icon::Error) -> Self {
        Self::Build(e)
    }
}
