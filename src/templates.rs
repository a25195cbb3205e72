const LOGIN_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>liqk gate</title>
    <style>
        body {
            font-family: system-ui, sans-serif;
            background: #f4f4f5;
            color: #18181b;
            display: flex;
            align-items: center;
            justify-content: center;
            min-height: 100vh;
            margin: 0;
        }
        form {
            background: #fff;
            border: 1px solid #e4e4e7;
            border-radius: 8px;
            padding: 2rem;
            width: min(360px, 90vw);
        }
        h1 { font-size: 1.25rem; margin: 0 0 1rem 0; }
        input {
            width: 100%;
            box-sizing: border-box;
            padding: 0.6rem;
            font-family: monospace;
            margin-bottom: 1rem;
        }
        button { width: 100%; padding: 0.6rem; }
        .error { color: #b91c1c; margin: 0 0 1rem 0; }
    </style>
</head>
<body>
    <form method="post" action="/gate/login">
        <h1>liqk gate</h1>
"#;

const LOGIN_TAIL: &str = r#"        <input type="password" name="token" placeholder="Access token" autocomplete="off" autofocus required>
        <button type="submit">Sign in</button>
    </form>
</body>
</html>
"#;

const LOGIN_ERROR: &str = "        <p class=\"error\">Invalid access token</p>\n";

/// The login form, optionally with an error banner.
pub fn login_page(failed: bool) -> String {
    let mut page = String::with_capacity(LOGIN_HEAD.len() + LOGIN_TAIL.len() + LOGIN_ERROR.len());
    page.push_str(LOGIN_HEAD);
    if failed {
        page.push_str(LOGIN_ERROR);
    }
    page.push_str(LOGIN_TAIL);
    page
}
