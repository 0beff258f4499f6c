//! Demonstration of a settings context read by independent consumers
//!
//! Run with `RUST_LOG=lazy_context=trace` to see subscriptions and
//! notifications as they happen.

use lazy_context::{AnyValue, FlatValue, LazyContext, Scope};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Lazy Context Example: Settings ===\n");

    let settings: LazyContext<AnyValue> = LazyContext::new(
        FlatValue::new()
            .with_any("theme", "light")
            .with_any("font_size", 12u32),
    );

    println!("1. Providing settings to the app subtree");
    let provider = settings.provider(
        FlatValue::new()
            .with_any("theme", "dark")
            .with_any("font_size", 14u32),
    );
    let app = Scope::root().provide(&provider);

    let theme_view = settings.effect(&app, |binding| {
        let theme = binding.read_as::<&str>("theme");
        println!("   [ThemeView] theme = {:?}", theme.as_deref());
    });
    let font_view = settings.effect(&app, |binding| {
        let size = binding.read_as::<u32>("font_size");
        println!("   [FontView] font size = {:?}", size.as_deref());
    });

    println!("\n2. Changing only the font size");
    provider.store().update(|draft| {
        draft.insert_any("font_size", 16u32);
    });

    println!("\n3. Changing only the theme");
    provider.store().update(|draft| {
        draft.insert_any("theme", "solarized");
    });

    println!(
        "\nRenders: ThemeView = {}, FontView = {}",
        theme_view.run_count(),
        font_view.run_count()
    );

    println!("\n4. A consumer outside the provider sees the defaults");
    let outside = settings.bind(&Scope::root(), || {});
    println!(
        "   theme = {:?}",
        outside.read_as::<&str>("theme").as_deref()
    );
}
