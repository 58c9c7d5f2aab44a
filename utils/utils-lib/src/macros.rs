/// Print package related information.
/// This includes the package name and version.
#[macro_export]
macro_rules! print_package_info {
    () => {
        println!(
            "{} version {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
        )
    };
}

/// Get the package description, falling back to the package name if none is set.
#[macro_export]
macro_rules! package_description {
    () => {
        match env!("CARGO_PKG_DESCRIPTION") {
            "" => env!("CARGO_PKG_NAME"),
            description => description,
        }
    };
}

/// Get package version.
#[macro_export]
macro_rules! package_info {
    () => {
        concat!("version ", env!("CARGO_PKG_VERSION"))
    };
}
