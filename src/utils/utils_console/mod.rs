use colored::Colorize;

/// Prints the given string with the given color.
///
/// ## Example
/// ```
/// use armopt::utils::utils_console::{armopt_print, PrintMode, PrintColor};
/// armopt_print("test", PrintMode::Print, PrintColor::Blue, false);
/// ```
pub fn armopt_print(s: &str, mode: PrintMode, color: PrintColor, bolded: bool) {
    let mut string = s.normal();
    if &color != &PrintColor::None {
        let c = color.get_color_triple();
        string = string.truecolor(c.0, c.1, c.2);
    }
    if bolded { string = string.bold(); }
    match mode {
        PrintMode::Println => { println!("{}", string); }
        PrintMode::Print => { print!("{}", string); }
    }
}

/// Prints `s` in bold yellow behind a `WARNING:` tag.
///
/// ## Example
/// ```
/// use armopt::utils::utils_console::armopt_print_warning;
/// armopt_print_warning("solver stopped before converging");
/// ```
pub fn armopt_print_warning(s: &str) {
    armopt_print(&format!("WARNING: {}", s), PrintMode::Println, PrintColor::Yellow, true);
}

/// Enum that is used in armopt_print function.
/// Println will cause a new line after each line, while Print will not.
#[derive(Clone, Debug)]
pub enum PrintMode {
    Println,
    Print
}

/// Defines color for an armopt print command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrintColor {
    None,
    Blue,
    Green,
    Red,
    Yellow,
    Cyan
}
impl PrintColor {
    pub fn get_color_triple(&self) -> (u8, u8, u8) {
        match self {
            PrintColor::None => { (0,0,0) }
            PrintColor::Blue => { return (0, 0, 255) }
            PrintColor::Green => { return (0, 255, 0) }
            PrintColor::Red => { return (255, 0, 0) }
            PrintColor::Yellow => { return (255, 255, 0) }
            PrintColor::Cyan => { return (0, 255, 255) }
        }
    }
}

/// Prints a bolded, colored label followed by an uncolored value on the same line.
pub fn armopt_print_labeled_value(label: &str, value: &str, label_color: PrintColor) {
    armopt_print(&format!("{}: ", label), PrintMode::Print, label_color, true);
    armopt_print(value, PrintMode::Println, PrintColor::None, false);
}
