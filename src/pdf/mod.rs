mod wkhtml;

pub use wkhtml::render_pdf;
