use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the footer: view breadcrumb on the left, cache size on the right
pub fn draw_footer(frame: &mut Frame, area: Rect, breadcrumb: &[String], cached: usize) {
  let last = breadcrumb.len().saturating_sub(1);
  let mut spans = vec![Span::raw(" ")];

  for (i, part) in breadcrumb.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
    }
    let style = if i == last {
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::White)
    };
    spans.push(Span::styled(part.clone(), style));
  }

  let cache = Line::from(Span::styled(
    format!("{} cached ", cached),
    Style::default().fg(Color::DarkGray),
  ))
  .alignment(Alignment::Right);

  let style = Style::default().bg(Color::Black);
  frame.render_widget(Paragraph::new(Line::from(spans)).style(style), area);
  frame.render_widget(Paragraph::new(cache), area);
}
