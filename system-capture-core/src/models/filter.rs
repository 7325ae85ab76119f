use super::content::{ApplicationId, DisplayId, WindowId};

/// Which display is captured and which applications and windows are left out.
///
/// Built fresh for every session. The excluded applications behave as a set:
/// adding an identifier that is already present is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFilter {
    display: DisplayId,
    excluded_applications: Vec<ApplicationId>,
    excepted_windows: Vec<WindowId>,
}

impl ContentFilter {
    pub fn new(display: DisplayId) -> Self {
        Self {
            display,
            excluded_applications: Vec::new(),
            excepted_windows: Vec::new(),
        }
    }

    pub fn excluding_application(mut self, id: ApplicationId) -> Self {
        self.exclude_application(id);
        self
    }

    pub fn excluding_applications<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = ApplicationId>,
    {
        for id in ids {
            self.exclude_application(id);
        }
        self
    }

    pub fn excepting_window(mut self, id: WindowId) -> Self {
        if !self.excepted_windows.contains(&id) {
            self.excepted_windows.push(id);
        }
        self
    }

    pub fn exclude_application(&mut self, id: ApplicationId) {
        if !self.excluded_applications.contains(&id) {
            self.excluded_applications.push(id);
        }
    }

    pub fn display(&self) -> DisplayId {
        self.display
    }

    pub fn excluded_applications(&self) -> &[ApplicationId] {
        &self.excluded_applications
    }

    pub fn excepted_windows(&self) -> &[WindowId] {
        &self.excepted_windows
    }

    pub fn excludes(&self, id: &ApplicationId) -> bool {
        self.excluded_applications.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusions_never_duplicate() {
        let own = ApplicationId::new("com.example.cap");
        let filter = ContentFilter::new(DisplayId(1))
            .excluding_applications([own.clone(), own.clone()])
            .excluding_application(own.clone());

        assert_eq!(filter.excluded_applications(), &[own.clone()]);
        assert!(filter.excludes(&own));
    }

    #[test]
    fn no_excepted_windows_by_default() {
        let filter = ContentFilter::new(DisplayId(9));
        assert_eq!(filter.display(), DisplayId(9));
        assert!(filter.excepted_windows().is_empty());
        assert!(filter.excluded_applications().is_empty());

        let filter = filter.excepting_window(WindowId(4)).excepting_window(WindowId(4));
        assert_eq!(filter.excepted_windows(), &[WindowId(4)]);
    }
}
